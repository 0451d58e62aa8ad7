//! Security challenge lifecycle.
//!
//! A challenge gates a sensitive action until verified. Lifecycle per
//! challenge: pending → completed (terminal) on successful verification,
//! pending → expired (terminal) on timeout, and pending → failed
//! (non-terminal) on a wrong response. Exhausting the attempt budget is
//! reported but does not auto-resolve the record.
//!
//! Verification dispatches through an enum-keyed validator table so each
//! challenge type stays pluggable and independently testable.

use crate::clock::Clock;
use crate::config::ChallengeConfig;
use crate::events::SecurityEvent;
use crate::providers::AuditSink;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use dashmap::DashMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// Unique identifier for a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeId(pub uuid::Uuid);

impl ChallengeId {
    /// Generate a new random `ChallengeId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ChallengeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Kinds of verification challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChallengeType {
    /// Pre-registered security question.
    SecurityQuestion,
    /// CAPTCHA solve.
    Captcha,
    /// Token delivered by email.
    EmailVerification,
    /// Code delivered by SMS/voice.
    PhoneVerification,
    /// Manual operator approval.
    AdminApproval,
    /// Issued automatically by the risk engine.
    RiskBased,
}

impl ChallengeType {
    /// Stable name for logs and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SecurityQuestion => "SECURITY_QUESTION",
            Self::Captcha => "CAPTCHA",
            Self::EmailVerification => "EMAIL_VERIFICATION",
            Self::PhoneVerification => "PHONE_VERIFICATION",
            Self::AdminApproval => "ADMIN_APPROVAL",
            Self::RiskBased => "RISK_BASED",
        }
    }
}

/// A verification challenge gating a sensitive action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityChallenge {
    /// Challenge identifier.
    pub id: ChallengeId,

    /// Identity being challenged.
    pub identity: String,

    /// Challenge kind.
    pub challenge_type: ChallengeType,

    /// Random token the response must reference.
    pub verification_token: String,

    /// When the challenge was issued.
    pub issued_at: DateTime<Utc>,

    /// When the challenge stops being verifiable.
    pub expires_at: DateTime<Utc>,

    /// Verification attempts consumed.
    pub attempt_count: u32,

    /// Whether the challenge verified successfully (terminal).
    pub completed: bool,

    /// Whether a sweep marked the challenge expired (terminal).
    pub expired: bool,

    /// IP that triggered the challenge.
    pub ip_address: IpAddr,

    /// User agent that triggered the challenge.
    pub user_agent: String,
}

impl SecurityChallenge {
    /// Whether this challenge can still be verified at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.completed && !self.expired && now < self.expires_at
    }
}

/// Why a verification attempt did or did not complete a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeVerification {
    /// The response verified; the challenge is complete.
    Completed,
    /// No challenge owns this token.
    Unknown,
    /// The challenge is past its expiry.
    Expired,
    /// The challenge already completed; this is a replay.
    AlreadyCompleted,
    /// The response did not verify; the challenge stays pending.
    Rejected,
}

/// Verification logic for one challenge type.
pub trait ChallengeValidator: Send + Sync {
    /// Check a response against a challenge.
    fn validate(&self, challenge: &SecurityChallenge, response: &str) -> bool;
}

/// Validator that accepts the challenge's own token, compared in constant
/// time. Used for flows where the token itself is delivered out-of-band.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenMatchValidator;

impl ChallengeValidator for TokenMatchValidator {
    fn validate(&self, challenge: &SecurityChallenge, response: &str) -> bool {
        constant_time_eq(
            challenge.verification_token.as_bytes(),
            response.as_bytes(),
        )
    }
}

/// Validator for challenge types without a configured flow: always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAllValidator;

impl ChallengeValidator for RejectAllValidator {
    fn validate(&self, _challenge: &SecurityChallenge, _response: &str) -> bool {
        false
    }
}

/// Challenge lifecycle manager.
pub struct ChallengeManager {
    // Per-identity buckets keep the one-active-per-type invariant inside a
    // single entry lock; the token index serves the verify path.
    by_identity: DashMap<String, Vec<SecurityChallenge>>,
    token_index: DashMap<String, String>,
    validators: HashMap<ChallengeType, Box<dyn ChallengeValidator>>,
    config: ChallengeConfig,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl ChallengeManager {
    /// Create a manager with the default validator table: email
    /// verification checks the delivered token; every other type rejects
    /// until the embedding application plugs a real flow in.
    #[must_use]
    pub fn new(config: ChallengeConfig, clock: Arc<dyn Clock>, audit: Arc<dyn AuditSink>) -> Self {
        let mut validators: HashMap<ChallengeType, Box<dyn ChallengeValidator>> = HashMap::new();
        validators.insert(
            ChallengeType::EmailVerification,
            Box::new(TokenMatchValidator),
        );
        for challenge_type in [
            ChallengeType::SecurityQuestion,
            ChallengeType::Captcha,
            ChallengeType::PhoneVerification,
            ChallengeType::AdminApproval,
            ChallengeType::RiskBased,
        ] {
            validators.insert(challenge_type, Box::new(RejectAllValidator));
        }

        Self {
            by_identity: DashMap::new(),
            token_index: DashMap::new(),
            validators,
            config,
            clock,
            audit,
        }
    }

    /// Replace the validator for one challenge type.
    #[must_use]
    pub fn with_validator(
        mut self,
        challenge_type: ChallengeType,
        validator: impl ChallengeValidator + 'static,
    ) -> Self {
        self.validators.insert(challenge_type, Box::new(validator));
        self
    }

    /// Issue a challenge, or return the existing active one of the same
    /// type (idempotent-by-type).
    pub fn create(
        &self,
        identity: &str,
        challenge_type: ChallengeType,
        ip: IpAddr,
        user_agent: &str,
    ) -> SecurityChallenge {
        let now = self.clock.now();
        let mut bucket = self.by_identity.entry(identity.to_owned()).or_default();

        if let Some(existing) = bucket
            .iter()
            .find(|c| c.challenge_type == challenge_type && c.is_active_at(now))
        {
            return existing.clone();
        }

        let challenge = SecurityChallenge {
            id: ChallengeId::new(),
            identity: identity.to_owned(),
            challenge_type,
            verification_token: generate_token(),
            issued_at: now,
            expires_at: now + self.config.expiry,
            attempt_count: 0,
            completed: false,
            expired: false,
            ip_address: ip,
            user_agent: user_agent.to_owned(),
        };

        self.token_index
            .insert(challenge.verification_token.clone(), identity.to_owned());
        bucket.push(challenge.clone());

        tracing::info!(
            identity = %identity,
            challenge_type = challenge_type.as_str(),
            "challenge issued"
        );
        self.audit.append(SecurityEvent::ChallengeCreated {
            identity: identity.to_owned(),
            challenge_id: challenge.id,
            challenge_type,
            ip_address: ip,
            occurred_at: now,
        });

        challenge
    }

    /// Verify a response against the challenge owning `token`.
    ///
    /// Unknown tokens, expired challenges, and completed challenges all
    /// answer `false`; the latter two additionally leave an audit trail.
    /// Exhausting the attempt budget is reported but never auto-resolves
    /// the challenge.
    pub fn verify(&self, token: &str, response: &str, ip: IpAddr) -> bool {
        matches!(
            self.verify_detailed(token, response, ip),
            ChallengeVerification::Completed
        )
    }

    /// Like [`Self::verify`], but reports why a verification did not
    /// complete so callers can surface the right coarse outcome.
    pub fn verify_detailed(&self, token: &str, response: &str, ip: IpAddr) -> ChallengeVerification {
        let now = self.clock.now();
        let Some(identity) = self.token_index.get(token).map(|entry| entry.clone()) else {
            return ChallengeVerification::Unknown;
        };
        let Some(mut bucket) = self.by_identity.get_mut(&identity) else {
            return ChallengeVerification::Unknown;
        };
        let Some(challenge) = bucket
            .iter_mut()
            .find(|c| c.verification_token == token)
        else {
            return ChallengeVerification::Unknown;
        };

        if challenge.expired || now > challenge.expires_at {
            self.audit.append(SecurityEvent::ChallengeExpired {
                identity: identity.clone(),
                challenge_id: challenge.id,
                challenge_type: challenge.challenge_type,
                occurred_at: now,
            });
            return ChallengeVerification::Expired;
        }

        if challenge.completed {
            tracing::warn!(
                identity = %identity,
                challenge_id = %challenge.id.0,
                ip = %ip,
                "completed challenge token presented again"
            );
            self.audit.append(SecurityEvent::ChallengeReuseAttempt {
                identity: identity.clone(),
                challenge_id: challenge.id,
                ip_address: ip,
                occurred_at: now,
            });
            return ChallengeVerification::AlreadyCompleted;
        }

        challenge.attempt_count += 1;

        let validator = self.validators.get(&challenge.challenge_type);
        let valid = validator.is_some_and(|v| v.validate(challenge, response));

        if valid {
            challenge.completed = true;
            self.audit.append(SecurityEvent::ChallengeCompleted {
                identity: identity.clone(),
                challenge_id: challenge.id,
                challenge_type: challenge.challenge_type,
                occurred_at: now,
            });
            return ChallengeVerification::Completed;
        }

        self.audit.append(SecurityEvent::ChallengeFailed {
            identity: identity.clone(),
            challenge_id: challenge.id,
            attempt_count: challenge.attempt_count,
            occurred_at: now,
        });

        if challenge.attempt_count >= self.config.max_attempts {
            tracing::warn!(
                identity = %identity,
                challenge_id = %challenge.id.0,
                attempts = challenge.attempt_count,
                "challenge attempt budget exhausted"
            );
            self.audit.append(SecurityEvent::ChallengeMaxAttempts {
                identity: identity.clone(),
                challenge_id: challenge.id,
                attempt_count: challenge.attempt_count,
                occurred_at: now,
            });
        }

        ChallengeVerification::Rejected
    }

    /// The identity's currently active challenge, if any.
    #[must_use]
    pub fn active_challenge(&self, identity: &str) -> Option<SecurityChallenge> {
        let now = self.clock.now();
        self.by_identity.get(identity).and_then(|bucket| {
            bucket.iter().find(|c| c.is_active_at(now)).cloned()
        })
    }

    /// Whether the identity has any active challenge.
    #[must_use]
    pub fn has_active_challenge(&self, identity: &str) -> bool {
        self.active_challenge(identity).is_some()
    }

    /// Mark pending challenges past expiry, then prune long-dead records.
    pub fn sweep_expired(&self) {
        let now = self.clock.now();
        let retention = self.config.expiry * 48;
        let mut expired_events = Vec::new();
        let mut pruned_tokens = Vec::new();

        self.by_identity.retain(|_, bucket| {
            for challenge in bucket.iter_mut() {
                if !challenge.completed && !challenge.expired && now > challenge.expires_at {
                    challenge.expired = true;
                    expired_events.push(SecurityEvent::ChallengeExpired {
                        identity: challenge.identity.clone(),
                        challenge_id: challenge.id,
                        challenge_type: challenge.challenge_type,
                        occurred_at: now,
                    });
                }
            }
            bucket.retain(|challenge| {
                let dead = (challenge.completed || challenge.expired)
                    && now - challenge.expires_at > retention;
                if dead {
                    pruned_tokens.push(challenge.verification_token.clone());
                }
                !dead
            });
            !bucket.is_empty()
        });

        for token in pruned_tokens {
            self.token_index.remove(&token);
        }
        for event in expired_events {
            self.audit.append(event);
        }
    }
}

/// 32 bytes of randomness, base64url without padding.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::mocks::{FixedClock, MemoryAuditSink};
    use chrono::Duration;
    use std::net::Ipv4Addr;

    fn manager() -> (Arc<FixedClock>, Arc<MemoryAuditSink>, ChallengeManager) {
        let clock = Arc::new(FixedClock::default());
        let sink = Arc::new(MemoryAuditSink::new());
        let manager = ChallengeManager::new(
            ChallengeConfig::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&sink) as Arc<dyn AuditSink>,
        );
        (clock, sink, manager)
    }

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9))
    }

    #[test]
    fn create_is_idempotent_by_type() {
        let (_clock, _sink, manager) = manager();
        let first = manager.create("a@x.com", ChallengeType::EmailVerification, ip(), "ua");
        let second = manager.create("a@x.com", ChallengeType::EmailVerification, ip(), "ua");
        assert_eq!(first.id, second.id);

        let other = manager.create("a@x.com", ChallengeType::Captcha, ip(), "ua");
        assert_ne!(first.id, other.id);
    }

    #[test]
    fn email_challenge_verifies_with_its_token() {
        let (_clock, sink, manager) = manager();
        let challenge = manager.create("a@x.com", ChallengeType::EmailVerification, ip(), "ua");
        assert!(manager.verify(&challenge.verification_token, &challenge.verification_token, ip()));
        assert_eq!(sink.count_kind(EventKind::ChallengeCompleted), 1);
    }

    #[test]
    fn replayed_token_is_rejected() {
        let (_clock, sink, manager) = manager();
        let challenge = manager.create("a@x.com", ChallengeType::EmailVerification, ip(), "ua");
        let token = challenge.verification_token.clone();
        assert!(manager.verify(&token, &token, ip()));
        assert!(!manager.verify(&token, &token, ip()));
        assert_eq!(sink.count_kind(EventKind::ChallengeReuseAttempt), 1);
    }

    #[test]
    fn unknown_token_fails_quietly() {
        let (_clock, sink, manager) = manager();
        assert!(!manager.verify("not-a-token", "whatever", ip()));
        assert_eq!(sink.events().len(), 0);
    }

    #[test]
    fn expired_challenge_fails_without_state_change() {
        let (clock, sink, manager) = manager();
        let challenge = manager.create("a@x.com", ChallengeType::EmailVerification, ip(), "ua");
        clock.advance(Duration::minutes(31));

        let token = challenge.verification_token.clone();
        assert!(!manager.verify(&token, &token, ip()));
        assert_eq!(sink.count_kind(EventKind::ChallengeExpired), 1);
        // No attempt was consumed by the expired presentation.
        let after = manager
            .by_identity
            .get("a@x.com")
            .map(|b| b[0].attempt_count);
        assert_eq!(after, Some(0));
    }

    #[test]
    fn stub_validators_reject_and_report_exhaustion() {
        let (_clock, sink, manager) = manager();
        let challenge = manager.create("a@x.com", ChallengeType::Captcha, ip(), "ua");
        let token = challenge.verification_token.clone();

        for _ in 0..3 {
            assert!(!manager.verify(&token, "any answer", ip()));
        }
        assert_eq!(sink.count_kind(EventKind::ChallengeMaxAttempts), 1);

        // Exhaustion is reported, not auto-resolved: the record stays
        // pending and further attempts keep failing.
        assert!(!manager.verify(&token, "any answer", ip()));
        assert!(manager.has_active_challenge("a@x.com"));
    }

    #[test]
    fn pluggable_validator_replaces_the_stub() {
        struct AlwaysPass;
        impl ChallengeValidator for AlwaysPass {
            fn validate(&self, _c: &SecurityChallenge, _r: &str) -> bool {
                true
            }
        }

        let clock = Arc::new(FixedClock::default());
        let sink = Arc::new(MemoryAuditSink::new());
        let manager = ChallengeManager::new(
            ChallengeConfig::default(),
            clock as Arc<dyn Clock>,
            sink as Arc<dyn AuditSink>,
        )
        .with_validator(ChallengeType::Captcha, AlwaysPass);

        let challenge = manager.create("a@x.com", ChallengeType::Captcha, ip(), "ua");
        assert!(manager.verify(&challenge.verification_token, "solved", ip()));
    }

    #[test]
    fn sweep_marks_expired_and_allows_reissue() {
        let (clock, sink, manager) = manager();
        let first = manager.create("a@x.com", ChallengeType::EmailVerification, ip(), "ua");
        clock.advance(Duration::minutes(31));
        manager.sweep_expired();
        assert_eq!(sink.count_kind(EventKind::ChallengeExpired), 1);
        assert!(!manager.has_active_challenge("a@x.com"));

        let second = manager.create("a@x.com", ChallengeType::EmailVerification, ip(), "ua");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn sweep_does_not_expire_completed_challenges() {
        let (clock, sink, manager) = manager();
        let challenge = manager.create("a@x.com", ChallengeType::EmailVerification, ip(), "ua");
        let token = challenge.verification_token.clone();
        assert!(manager.verify(&token, &token, ip()));

        clock.advance(Duration::minutes(31));
        manager.sweep_expired();
        assert_eq!(sink.count_kind(EventKind::ChallengeExpired), 0);
    }
}
