//! Device fingerprint trust tracking.
//!
//! A fingerprint is a stable SHA-256 hash over the client-supplied request
//! signals. Trust is earned slowly through consistent usage and lost
//! quickly on IP churn; a fingerprint on the malicious denylist is worth
//! nothing for any identity. The denylist lives for the process lifetime.

use crate::clock::Clock;
use crate::config::DeviceConfig;
use crate::events::SecurityEvent;
use crate::providers::AuditSink;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::net::IpAddr;
use std::sync::Arc;

/// Client-supplied signals a fingerprint is derived from.
///
/// The field order is part of the contract: the same signals always hash to
/// the same fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintSignals {
    /// `User-Agent` header.
    pub user_agent: String,
    /// `Accept-Language` header.
    pub accept_language: String,
    /// `Accept-Encoding` header.
    pub accept_encoding: String,
    /// `Accept` header.
    pub accept: String,
    /// Client-hint headers (`Sec-CH-UA*`), in the order received.
    pub client_hints: Vec<String>,
}

impl FingerprintSignals {
    /// Derive the stable fingerprint hash for these signals.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.user_agent.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.accept_language.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.accept_encoding.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.accept.as_bytes());
        for hint in &self.client_hints {
            hasher.update(b"\n");
            hasher.update(hint.as_bytes());
        }
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

/// Usage record for one (identity, fingerprint) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Identity that used the device.
    pub identity: String,

    /// Fingerprint hash.
    pub fingerprint_hash: String,

    /// IP the device was first seen from.
    pub first_seen_ip: IpAddr,

    /// IP the device was last seen from.
    pub last_seen_ip: IpAddr,

    /// Confidence that this device belongs to a consistent, legitimate
    /// user. Always within `[0, 1]`.
    pub trust_score: f64,

    /// Times the device has been seen for this identity.
    pub usage_count: u32,

    /// When the device was last seen.
    pub last_seen_at: DateTime<Utc>,
}

/// Fingerprint trust store with a malicious denylist.
pub struct DeviceTrustStore {
    // Keyed by fingerprint hash; one record per identity inside the bucket,
    // so denylisting a hash can zero every affected identity in one pass.
    devices: DashMap<String, Vec<DeviceRecord>>,
    malicious: DashSet<String>,
    config: DeviceConfig,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl DeviceTrustStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: DeviceConfig, clock: Arc<dyn Clock>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            devices: DashMap::new(),
            malicious: DashSet::new(),
            config,
            clock,
            audit,
        }
    }

    /// Record a device sighting for an identity.
    ///
    /// Returns `false` (and emits a security event) when the fingerprint is
    /// denylisted; the sighting is not recorded.
    pub fn record(&self, identity: &str, fingerprint_hash: &str, ip: IpAddr) -> bool {
        let now = self.clock.now();

        if self.malicious.contains(fingerprint_hash) {
            tracing::warn!(
                identity = %identity,
                fingerprint = %fingerprint_hash,
                ip = %ip,
                "denylisted fingerprint rejected"
            );
            self.audit.append(SecurityEvent::FingerprintRejected {
                identity: identity.to_owned(),
                fingerprint_hash: fingerprint_hash.to_owned(),
                ip_address: ip,
                occurred_at: now,
            });
            return false;
        }

        let mut bucket = self
            .devices
            .entry(fingerprint_hash.to_owned())
            .or_default();

        match bucket.iter_mut().find(|record| record.identity == identity) {
            Some(record) => {
                record.usage_count += 1;
                if record.last_seen_ip != ip {
                    // IP churn: sharp drop, and the streak restarts from the
                    // new address.
                    record.trust_score -= self.config.churn_penalty;
                } else if record.usage_count > self.config.consistency_threshold {
                    record.trust_score += self.config.growth_increment;
                }
                record.trust_score = record.trust_score.clamp(0.0, 1.0);
                record.last_seen_ip = ip;
                record.last_seen_at = now;
            }
            None => {
                bucket.push(DeviceRecord {
                    identity: identity.to_owned(),
                    fingerprint_hash: fingerprint_hash.to_owned(),
                    first_seen_ip: ip,
                    last_seen_ip: ip,
                    trust_score: self.config.initial_trust.clamp(0.0, 1.0),
                    usage_count: 1,
                    last_seen_at: now,
                });
            }
        }
        true
    }

    /// Whether the identity's device clears the trust threshold.
    #[must_use]
    pub fn is_trusted(&self, identity: &str, fingerprint_hash: &str) -> bool {
        if self.malicious.contains(fingerprint_hash) {
            return false;
        }
        self.trust_score(identity, fingerprint_hash)
            .is_some_and(|score| score >= self.config.trust_threshold)
    }

    /// Current trust score for an (identity, fingerprint) pair.
    #[must_use]
    pub fn trust_score(&self, identity: &str, fingerprint_hash: &str) -> Option<f64> {
        if self.malicious.contains(fingerprint_hash) {
            return Some(0.0);
        }
        self.devices.get(fingerprint_hash).and_then(|bucket| {
            bucket
                .iter()
                .find(|record| record.identity == identity)
                .map(|record| record.trust_score)
        })
    }

    /// Denylist a fingerprint and zero its trust for every identity.
    pub fn mark_suspicious(&self, fingerprint_hash: &str, reason: &str) {
        let now = self.clock.now();
        self.malicious.insert(fingerprint_hash.to_owned());
        if let Some(mut bucket) = self.devices.get_mut(fingerprint_hash) {
            for record in bucket.iter_mut() {
                record.trust_score = 0.0;
            }
        }
        tracing::warn!(
            fingerprint = %fingerprint_hash,
            reason = %reason,
            "fingerprint denylisted"
        );
        self.audit.append(SecurityEvent::FingerprintMarkedSuspicious {
            fingerprint_hash: fingerprint_hash.to_owned(),
            reason: reason.to_owned(),
            occurred_at: now,
        });
    }

    /// Whether a fingerprint is on the denylist.
    #[must_use]
    pub fn is_malicious(&self, fingerprint_hash: &str) -> bool {
        self.malicious.contains(fingerprint_hash)
    }

    /// All device records for an identity.
    #[must_use]
    pub fn known_devices(&self, identity: &str) -> Vec<DeviceRecord> {
        self.devices
            .iter()
            .flat_map(|bucket| {
                bucket
                    .iter()
                    .filter(|record| record.identity == identity)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::mocks::{FixedClock, MemoryAuditSink};
    use std::net::Ipv4Addr;

    fn store() -> (Arc<MemoryAuditSink>, DeviceTrustStore) {
        let clock = Arc::new(FixedClock::default());
        let sink = Arc::new(MemoryAuditSink::new());
        let store = DeviceTrustStore::new(
            DeviceConfig::default(),
            clock as Arc<dyn Clock>,
            Arc::clone(&sink) as Arc<dyn AuditSink>,
        );
        (sink, store)
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, last))
    }

    #[test]
    fn fingerprint_is_deterministic_and_signal_sensitive() {
        let signals = FingerprintSignals {
            user_agent: "Mozilla/5.0".into(),
            accept_language: "en-US".into(),
            accept_encoding: "gzip".into(),
            accept: "text/html".into(),
            client_hints: vec!["\"Chromium\";v=120".into()],
        };
        assert_eq!(signals.fingerprint(), signals.fingerprint());

        let mut changed = signals.clone();
        changed.accept_language = "fr-FR".into();
        assert_ne!(signals.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn sustained_consistent_usage_earns_trust() {
        let (_sink, store) = store();
        for _ in 0..30 {
            store.record("a@x.com", "fp-1", ip(1));
        }
        let score = store.trust_score("a@x.com", "fp-1").unwrap();
        assert!(score > 0.5, "got {score}");
        assert!(store.is_trusted("a@x.com", "fp-1"));
    }

    #[test]
    fn trust_is_clamped_to_one() {
        let (_sink, store) = store();
        for _ in 0..100 {
            store.record("a@x.com", "fp-1", ip(1));
        }
        let score = store.trust_score("a@x.com", "fp-1").unwrap();
        assert!(score <= 1.0);
    }

    #[test]
    fn ip_churn_drops_trust_sharply() {
        let (_sink, store) = store();
        store.record("a@x.com", "fp-1", ip(1));
        let before = store.trust_score("a@x.com", "fp-1").unwrap();
        store.record("a@x.com", "fp-1", ip(2));
        let after = store.trust_score("a@x.com", "fp-1").unwrap();
        assert!((before - after - 0.2).abs() < 1e-9, "{before} -> {after}");
    }

    #[test]
    fn denylisted_fingerprint_is_rejected_before_lookup() {
        let (sink, store) = store();
        store.mark_suspicious("fp-bad", "reported by fraud desk");

        assert!(!store.record("a@x.com", "fp-bad", ip(1)));
        assert_eq!(store.trust_score("a@x.com", "fp-bad"), Some(0.0));
        assert_eq!(sink.count_kind(EventKind::FingerprintRejected), 1);
    }

    #[test]
    fn denylisting_zeroes_trust_for_every_identity() {
        let (_sink, store) = store();
        for _ in 0..30 {
            store.record("a@x.com", "fp-1", ip(1));
            store.record("b@x.com", "fp-1", ip(2));
        }
        assert!(store.is_trusted("a@x.com", "fp-1"));

        store.mark_suspicious("fp-1", "credential stuffing source");
        assert!(!store.is_trusted("a@x.com", "fp-1"));
        assert!(!store.is_trusted("b@x.com", "fp-1"));
        assert_eq!(store.trust_score("a@x.com", "fp-1"), Some(0.0));
    }

    #[test]
    fn known_devices_lists_per_identity() {
        let (_sink, store) = store();
        store.record("a@x.com", "fp-1", ip(1));
        store.record("a@x.com", "fp-2", ip(1));
        store.record("b@x.com", "fp-1", ip(2));

        let devices = store.known_devices("a@x.com");
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.identity == "a@x.com"));
    }
}
