//! Concurrent-session accounting and eviction.
//!
//! Each identity may hold a bounded number of active sessions. Creating a
//! session past the bound evicts the oldest active ones first. Validation
//! enforces absolute expiry, inactivity timeout, and IP binding, and
//! refreshes the activity timestamp on success.

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::events::SecurityEvent;
use crate::providers::AuditSink;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Generate a new random `SessionId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// One authenticated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    /// Session identifier.
    pub session_id: SessionId,

    /// Session owner.
    pub identity: String,

    /// IP the session is bound to.
    pub ip_address: IpAddr,

    /// User agent at creation.
    pub user_agent: String,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// Last successful validation.
    pub last_activity_at: DateTime<Utc>,

    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,

    /// Whether the session is live.
    pub active: bool,
}

impl UserSession {
    /// Active, unexpired, and touched within the inactivity window at `now`.
    fn counts_at(&self, now: DateTime<Utc>, config: &SessionConfig) -> bool {
        self.active
            && now < self.expires_at
            && now - self.last_activity_at <= config.inactivity_timeout
    }
}

/// Session registry enforcing the per-identity concurrency limit.
pub struct SessionRegistry {
    by_identity: DashMap<String, Vec<UserSession>>,
    index: DashMap<SessionId, String>,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(config: SessionConfig, clock: Arc<dyn Clock>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            by_identity: DashMap::new(),
            index: DashMap::new(),
            config,
            clock,
            audit,
        }
    }

    /// Create a session, evicting surplus oldest active sessions first.
    pub fn create(&self, identity: &str, ip: IpAddr, user_agent: &str) -> UserSession {
        let now = self.clock.now();
        let mut bucket = self.by_identity.entry(identity.to_owned()).or_default();

        // Counting and eviction happen under the identity's entry lock so
        // two concurrent logins cannot both slip past the limit.
        loop {
            let active: Vec<usize> = bucket
                .iter()
                .enumerate()
                .filter(|(_, s)| s.counts_at(now, &self.config))
                .map(|(i, _)| i)
                .collect();
            if active.len() < self.config.max_concurrent_sessions {
                break;
            }
            // Oldest created first.
            let oldest = active
                .into_iter()
                .min_by_key(|&i| bucket[i].created_at)
                .map(|i| (i, bucket[i].session_id));
            let Some((index, session_id)) = oldest else {
                break;
            };
            bucket[index].active = false;
            tracing::info!(
                identity = %identity,
                session = %session_id.0,
                "session evicted: concurrent session limit"
            );
            self.audit.append(SecurityEvent::SessionEvicted {
                identity: identity.to_owned(),
                session_id,
                reason: "concurrent session limit".to_string(),
                occurred_at: now,
            });
        }

        let session = UserSession {
            session_id: SessionId::new(),
            identity: identity.to_owned(),
            ip_address: ip,
            user_agent: user_agent.to_owned(),
            created_at: now,
            last_activity_at: now,
            expires_at: now + self.config.session_ttl,
            active: true,
        };
        self.index.insert(session.session_id, identity.to_owned());
        bucket.push(session.clone());

        self.audit.append(SecurityEvent::SessionCreated {
            identity: identity.to_owned(),
            session_id: session.session_id,
            ip_address: ip,
            occurred_at: now,
        });

        session
    }

    /// Validate a session presented from `ip`, refreshing activity on
    /// success. Stale and mismatched presentations deactivate the session.
    pub fn validate(&self, session_id: SessionId, ip: IpAddr) -> bool {
        let now = self.clock.now();
        let Some(identity) = self.index.get(&session_id).map(|entry| entry.clone()) else {
            return false;
        };
        let Some(mut bucket) = self.by_identity.get_mut(&identity) else {
            return false;
        };
        let Some(session) = bucket
            .iter_mut()
            .find(|s| s.session_id == session_id)
        else {
            return false;
        };

        if !session.active {
            return false;
        }
        if now >= session.expires_at {
            session.active = false;
            return false;
        }
        if now - session.last_activity_at > self.config.inactivity_timeout {
            session.active = false;
            return false;
        }
        if session.ip_address != ip {
            session.active = false;
            tracing::warn!(
                identity = %identity,
                session = %session_id.0,
                expected = %session.ip_address,
                presented = %ip,
                "session presented from unexpected address"
            );
            self.audit.append(SecurityEvent::SessionIpMismatch {
                identity: identity.clone(),
                session_id,
                expected_ip: session.ip_address,
                presented_ip: ip,
                occurred_at: now,
            });
            return false;
        }

        session.last_activity_at = now;
        true
    }

    /// Explicitly revoke one session. Returns whether it was active.
    pub fn terminate(&self, session_id: SessionId, reason: &str) -> bool {
        let now = self.clock.now();
        let Some(identity) = self.index.get(&session_id).map(|entry| entry.clone()) else {
            return false;
        };
        let Some(mut bucket) = self.by_identity.get_mut(&identity) else {
            return false;
        };
        let Some(session) = bucket
            .iter_mut()
            .find(|s| s.session_id == session_id)
        else {
            return false;
        };
        if !session.active {
            return false;
        }
        session.active = false;
        self.audit.append(SecurityEvent::SessionTerminated {
            identity: identity.clone(),
            session_id,
            reason: reason.to_owned(),
            occurred_at: now,
        });
        true
    }

    /// Revoke every active session for an identity except one. Returns the
    /// number revoked.
    pub fn terminate_all_except(
        &self,
        identity: &str,
        keep_session_id: SessionId,
        reason: &str,
    ) -> usize {
        let now = self.clock.now();
        let Some(mut bucket) = self.by_identity.get_mut(identity) else {
            return 0;
        };
        let mut terminated = 0;
        for session in bucket
            .iter_mut()
            .filter(|s| s.active && s.session_id != keep_session_id)
        {
            session.active = false;
            terminated += 1;
            self.audit.append(SecurityEvent::SessionTerminated {
                identity: identity.to_owned(),
                session_id: session.session_id,
                reason: reason.to_owned(),
                occurred_at: now,
            });
        }
        terminated
    }

    /// Active, non-stale sessions for an identity.
    #[must_use]
    pub fn active_sessions(&self, identity: &str) -> Vec<UserSession> {
        let now = self.clock.now();
        self.by_identity.get(identity).map_or_else(Vec::new, |bucket| {
            bucket
                .iter()
                .filter(|s| s.counts_at(now, &self.config))
                .cloned()
                .collect()
        })
    }

    /// Deactivate stale sessions and prune records past their expiry.
    pub fn sweep_expired(&self) {
        let now = self.clock.now();
        let mut pruned = Vec::new();

        self.by_identity.retain(|_, bucket| {
            for session in bucket.iter_mut() {
                if session.active && !session.counts_at(now, &self.config) {
                    session.active = false;
                }
            }
            bucket.retain(|session| {
                let dead = !session.active && now >= session.expires_at;
                if dead {
                    pruned.push(session.session_id);
                }
                !dead
            });
            !bucket.is_empty()
        });

        for session_id in pruned {
            self.index.remove(&session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::mocks::{FixedClock, MemoryAuditSink};
    use chrono::Duration;
    use std::net::Ipv4Addr;

    fn registry() -> (Arc<FixedClock>, Arc<MemoryAuditSink>, SessionRegistry) {
        let clock = Arc::new(FixedClock::default());
        let sink = Arc::new(MemoryAuditSink::new());
        let registry = SessionRegistry::new(
            SessionConfig::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&sink) as Arc<dyn AuditSink>,
        );
        (clock, sink, registry)
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, last))
    }

    #[test]
    fn fourth_session_evicts_exactly_the_oldest() {
        let (clock, sink, registry) = registry();
        let first = registry.create("a@x.com", ip(1), "ua");
        clock.advance(Duration::seconds(1));
        let second = registry.create("a@x.com", ip(1), "ua");
        clock.advance(Duration::seconds(1));
        let third = registry.create("a@x.com", ip(1), "ua");
        clock.advance(Duration::seconds(1));
        let fourth = registry.create("a@x.com", ip(1), "ua");

        let active = registry.active_sessions("a@x.com");
        assert_eq!(active.len(), 3);
        let ids: Vec<SessionId> = active.iter().map(|s| s.session_id).collect();
        assert!(!ids.contains(&first.session_id));
        assert!(ids.contains(&second.session_id));
        assert!(ids.contains(&third.session_id));
        assert!(ids.contains(&fourth.session_id));
        assert_eq!(sink.count_kind(EventKind::SessionEvicted), 1);
    }

    #[test]
    fn validate_refreshes_activity() {
        let (clock, _sink, registry) = registry();
        let session = registry.create("a@x.com", ip(1), "ua");

        clock.advance(Duration::minutes(20));
        assert!(registry.validate(session.session_id, ip(1)));
        // The refresh above restarted the inactivity window.
        clock.advance(Duration::minutes(20));
        assert!(registry.validate(session.session_id, ip(1)));
    }

    #[test]
    fn inactivity_timeout_deactivates_on_touch() {
        let (clock, _sink, registry) = registry();
        let session = registry.create("a@x.com", ip(1), "ua");

        clock.advance(Duration::minutes(31));
        assert!(!registry.validate(session.session_id, ip(1)));
        // Deactivation is sticky.
        assert!(!registry.validate(session.session_id, ip(1)));
    }

    #[test]
    fn absolute_expiry_wins_over_activity() {
        let (clock, _sink, registry) = registry();
        let session = registry.create("a@x.com", ip(1), "ua");

        // Keep touching the session every 20 minutes for over 24 hours.
        for _ in 0..80 {
            clock.advance(Duration::minutes(20));
            registry.validate(session.session_id, ip(1));
        }
        assert!(!registry.validate(session.session_id, ip(1)));
    }

    #[test]
    fn ip_mismatch_deactivates_and_reports() {
        let (_clock, sink, registry) = registry();
        let session = registry.create("a@x.com", ip(1), "ua");

        assert!(!registry.validate(session.session_id, ip(2)));
        assert_eq!(sink.count_kind(EventKind::SessionIpMismatch), 1);
        // Even the right address is refused afterwards.
        assert!(!registry.validate(session.session_id, ip(1)));
    }

    #[test]
    fn unknown_session_is_invalid() {
        let (_clock, _sink, registry) = registry();
        assert!(!registry.validate(SessionId::new(), ip(1)));
    }

    #[test]
    fn terminate_all_except_keeps_the_survivor() {
        let (_clock, sink, registry) = registry();
        let keep = registry.create("a@x.com", ip(1), "ua");
        registry.create("a@x.com", ip(1), "ua");
        registry.create("a@x.com", ip(1), "ua");

        let terminated = registry.terminate_all_except("a@x.com", keep.session_id, "password change");
        assert_eq!(terminated, 2);
        let active = registry.active_sessions("a@x.com");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].session_id, keep.session_id);
        assert_eq!(sink.count_kind(EventKind::SessionTerminated), 2);
    }

    #[test]
    fn sweep_prunes_expired_records() {
        let (clock, _sink, registry) = registry();
        let session = registry.create("a@x.com", ip(1), "ua");
        clock.advance(Duration::hours(25));
        registry.sweep_expired();

        assert!(registry.active_sessions("a@x.com").is_empty());
        assert!(!registry.validate(session.session_id, ip(1)));
    }
}
