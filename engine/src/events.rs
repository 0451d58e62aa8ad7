//! Security domain events.
//!
//! Every component emits these into the [`crate::providers::AuditSink`];
//! the aggregator folds the trailing window into per-kind metrics. Events
//! are facts — they are never mutated after emission.

use crate::challenge::{ChallengeId, ChallengeType};
use crate::risk::{AssessmentKind, RiskLevel};
use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Discriminant for grouping events during aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Successful authentication.
    LoginSucceeded,
    /// Failed authentication.
    LoginFailed,
    /// An identity crossed the failure threshold and was locked.
    LockoutTriggered,
    /// An expired lock was physically cleared.
    LockoutCleared,
    /// An operator unlocked an identity.
    ManualUnlock,
    /// Burst-rate attack pattern from one IP.
    BruteForceBurst,
    /// Sustained attack pattern from one IP.
    SustainedAttack,
    /// A denylisted fingerprint tried to register.
    FingerprintRejected,
    /// A fingerprint was added to the denylist.
    FingerprintMarkedSuspicious,
    /// A risk assessment was recorded.
    RiskAssessed,
    /// A verification challenge was issued.
    ChallengeCreated,
    /// A challenge was verified successfully.
    ChallengeCompleted,
    /// A challenge response failed verification.
    ChallengeFailed,
    /// A challenge passed its expiry without completing.
    ChallengeExpired,
    /// A completed challenge token was presented again.
    ChallengeReuseAttempt,
    /// A challenge ran out of verification attempts.
    ChallengeMaxAttempts,
    /// A session was created.
    SessionCreated,
    /// A session was deactivated to enforce the concurrency limit.
    SessionEvicted,
    /// A session was presented from an unexpected IP.
    SessionIpMismatch,
    /// A session was explicitly terminated.
    SessionTerminated,
}

impl EventKind {
    /// Stable name for logs and alert payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoginSucceeded => "LOGIN_SUCCEEDED",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::LockoutTriggered => "LOCKOUT_TRIGGERED",
            Self::LockoutCleared => "LOCKOUT_CLEARED",
            Self::ManualUnlock => "MANUAL_UNLOCK",
            Self::BruteForceBurst => "BRUTE_FORCE_BURST",
            Self::SustainedAttack => "SUSTAINED_ATTACK",
            Self::FingerprintRejected => "FINGERPRINT_REJECTED",
            Self::FingerprintMarkedSuspicious => "FINGERPRINT_MARKED_SUSPICIOUS",
            Self::RiskAssessed => "RISK_ASSESSED",
            Self::ChallengeCreated => "SECURITY_CHALLENGE_CREATED",
            Self::ChallengeCompleted => "SECURITY_CHALLENGE_COMPLETED",
            Self::ChallengeFailed => "SECURITY_CHALLENGE_FAILED",
            Self::ChallengeExpired => "SECURITY_CHALLENGE_EXPIRED",
            Self::ChallengeReuseAttempt => "SECURITY_CHALLENGE_REUSE_ATTEMPT",
            Self::ChallengeMaxAttempts => "SECURITY_CHALLENGE_MAX_ATTEMPTS",
            Self::SessionCreated => "SESSION_CREATED",
            Self::SessionEvicted => "SESSION_EVICTED",
            Self::SessionIpMismatch => "SESSION_IP_MISMATCH",
            Self::SessionTerminated => "SESSION_TERMINATED",
        }
    }
}

/// Whether an event counts toward success or failure totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOutcome {
    /// Normal operation.
    Success,
    /// Denied, rejected, or hostile activity.
    Failure,
}

/// Security domain events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SecurityEvent {
    // ═══════════════════════════════════════════════════════════════════════
    // Authentication
    // ═══════════════════════════════════════════════════════════════════════
    /// Credentials verified and no gate blocked the login.
    LoginSucceeded {
        /// Subject of the login.
        identity: String,
        /// Source address.
        ip_address: IpAddr,
        /// When the login completed.
        occurred_at: DateTime<Utc>,
    },

    /// Credentials rejected.
    LoginFailed {
        /// Subject of the attempt.
        identity: String,
        /// Source address.
        ip_address: IpAddr,
        /// When the attempt was rejected.
        occurred_at: DateTime<Utc>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Lockout
    // ═══════════════════════════════════════════════════════════════════════
    /// The failure counter reached the threshold.
    LockoutTriggered {
        /// Locked identity.
        identity: String,
        /// Failures accumulated at the moment of locking.
        failed_attempts: u32,
        /// When the lock expires.
        locked_until: DateTime<Utc>,
        /// When the lock was triggered.
        occurred_at: DateTime<Utc>,
    },

    /// A sweep cleared a lock whose expiry had passed.
    LockoutCleared {
        /// Unlocked identity.
        identity: String,
        /// When the sweep cleared it.
        occurred_at: DateTime<Utc>,
    },

    /// An operator override removed a lock.
    ManualUnlock {
        /// Unlocked identity.
        identity: String,
        /// Operator who performed the unlock.
        actor: String,
        /// When the unlock happened.
        occurred_at: DateTime<Utc>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Brute Force
    // ═══════════════════════════════════════════════════════════════════════
    /// More than the burst threshold of attempts inside the burst window.
    BruteForceBurst {
        /// Attacking address.
        ip_address: IpAddr,
        /// Attempts observed in the episode so far.
        attempt_count: u32,
        /// User agent presented on the latest attempt.
        user_agent: String,
        /// When the pattern was detected.
        occurred_at: DateTime<Utc>,
    },

    /// More than the sustained threshold of attempts inside the sustained window.
    SustainedAttack {
        /// Attacking address.
        ip_address: IpAddr,
        /// Attempts observed in the episode so far.
        attempt_count: u32,
        /// When the pattern was detected.
        occurred_at: DateTime<Utc>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Device Trust
    // ═══════════════════════════════════════════════════════════════════════
    /// A denylisted fingerprint attempted to register usage.
    FingerprintRejected {
        /// Identity the fingerprint tried to attach to.
        identity: String,
        /// The rejected fingerprint hash.
        fingerprint_hash: String,
        /// Source address of the attempt.
        ip_address: IpAddr,
        /// When the rejection happened.
        occurred_at: DateTime<Utc>,
    },

    /// A fingerprint was denylisted and its trust zeroed everywhere.
    FingerprintMarkedSuspicious {
        /// The denylisted fingerprint hash.
        fingerprint_hash: String,
        /// Why it was denylisted.
        reason: String,
        /// When it was denylisted.
        occurred_at: DateTime<Utc>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Risk
    // ═══════════════════════════════════════════════════════════════════════
    /// A risk assessment was computed and recorded.
    RiskAssessed {
        /// Assessed identity.
        identity: String,
        /// Source address.
        ip_address: IpAddr,
        /// Overall score.
        score: f64,
        /// Derived level.
        level: RiskLevel,
        /// Action category that was assessed.
        kind: AssessmentKind,
        /// When the assessment was recorded.
        occurred_at: DateTime<Utc>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Challenges
    // ═══════════════════════════════════════════════════════════════════════
    /// A verification challenge was issued.
    ChallengeCreated {
        /// Challenged identity.
        identity: String,
        /// Challenge identifier.
        challenge_id: ChallengeId,
        /// Challenge kind.
        challenge_type: ChallengeType,
        /// Source address that triggered the challenge.
        ip_address: IpAddr,
        /// When the challenge was issued.
        occurred_at: DateTime<Utc>,
    },

    /// A challenge was verified and completed.
    ChallengeCompleted {
        /// Challenged identity.
        identity: String,
        /// Challenge identifier.
        challenge_id: ChallengeId,
        /// Challenge kind.
        challenge_type: ChallengeType,
        /// When the challenge completed.
        occurred_at: DateTime<Utc>,
    },

    /// A challenge response failed verification.
    ChallengeFailed {
        /// Challenged identity.
        identity: String,
        /// Challenge identifier.
        challenge_id: ChallengeId,
        /// Attempts consumed so far.
        attempt_count: u32,
        /// When the failure was recorded.
        occurred_at: DateTime<Utc>,
    },

    /// A challenge expired before completion.
    ChallengeExpired {
        /// Challenged identity.
        identity: String,
        /// Challenge identifier.
        challenge_id: ChallengeId,
        /// Challenge kind.
        challenge_type: ChallengeType,
        /// When the expiry was observed.
        occurred_at: DateTime<Utc>,
    },

    /// A completed challenge token was presented again.
    ChallengeReuseAttempt {
        /// Challenged identity.
        identity: String,
        /// Challenge identifier.
        challenge_id: ChallengeId,
        /// Source address of the replay.
        ip_address: IpAddr,
        /// When the replay was observed.
        occurred_at: DateTime<Utc>,
    },

    /// A challenge consumed its attempt budget.
    ChallengeMaxAttempts {
        /// Challenged identity.
        identity: String,
        /// Challenge identifier.
        challenge_id: ChallengeId,
        /// Attempts consumed.
        attempt_count: u32,
        /// When exhaustion was observed.
        occurred_at: DateTime<Utc>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Sessions
    // ═══════════════════════════════════════════════════════════════════════
    /// A session was created.
    SessionCreated {
        /// Session owner.
        identity: String,
        /// Session identifier.
        session_id: SessionId,
        /// Source address.
        ip_address: IpAddr,
        /// When the session was created.
        occurred_at: DateTime<Utc>,
    },

    /// A session was deactivated to make room for a newer one.
    SessionEvicted {
        /// Session owner.
        identity: String,
        /// Evicted session.
        session_id: SessionId,
        /// Why it was evicted.
        reason: String,
        /// When it was evicted.
        occurred_at: DateTime<Utc>,
    },

    /// A session token was presented from the wrong address.
    SessionIpMismatch {
        /// Session owner.
        identity: String,
        /// Affected session.
        session_id: SessionId,
        /// Address the session was bound to.
        expected_ip: IpAddr,
        /// Address that presented the session.
        presented_ip: IpAddr,
        /// When the mismatch was observed.
        occurred_at: DateTime<Utc>,
    },

    /// A session was explicitly revoked.
    SessionTerminated {
        /// Session owner.
        identity: String,
        /// Terminated session.
        session_id: SessionId,
        /// Why it was terminated.
        reason: String,
        /// When it was terminated.
        occurred_at: DateTime<Utc>,
    },
}

impl SecurityEvent {
    /// Grouping discriminant.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::LoginSucceeded { .. } => EventKind::LoginSucceeded,
            Self::LoginFailed { .. } => EventKind::LoginFailed,
            Self::LockoutTriggered { .. } => EventKind::LockoutTriggered,
            Self::LockoutCleared { .. } => EventKind::LockoutCleared,
            Self::ManualUnlock { .. } => EventKind::ManualUnlock,
            Self::BruteForceBurst { .. } => EventKind::BruteForceBurst,
            Self::SustainedAttack { .. } => EventKind::SustainedAttack,
            Self::FingerprintRejected { .. } => EventKind::FingerprintRejected,
            Self::FingerprintMarkedSuspicious { .. } => EventKind::FingerprintMarkedSuspicious,
            Self::RiskAssessed { .. } => EventKind::RiskAssessed,
            Self::ChallengeCreated { .. } => EventKind::ChallengeCreated,
            Self::ChallengeCompleted { .. } => EventKind::ChallengeCompleted,
            Self::ChallengeFailed { .. } => EventKind::ChallengeFailed,
            Self::ChallengeExpired { .. } => EventKind::ChallengeExpired,
            Self::ChallengeReuseAttempt { .. } => EventKind::ChallengeReuseAttempt,
            Self::ChallengeMaxAttempts { .. } => EventKind::ChallengeMaxAttempts,
            Self::SessionCreated { .. } => EventKind::SessionCreated,
            Self::SessionEvicted { .. } => EventKind::SessionEvicted,
            Self::SessionIpMismatch { .. } => EventKind::SessionIpMismatch,
            Self::SessionTerminated { .. } => EventKind::SessionTerminated,
        }
    }

    /// Identity the event is attributed to, when there is one.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::LoginSucceeded { identity, .. }
            | Self::LoginFailed { identity, .. }
            | Self::LockoutTriggered { identity, .. }
            | Self::LockoutCleared { identity, .. }
            | Self::ManualUnlock { identity, .. }
            | Self::FingerprintRejected { identity, .. }
            | Self::RiskAssessed { identity, .. }
            | Self::ChallengeCreated { identity, .. }
            | Self::ChallengeCompleted { identity, .. }
            | Self::ChallengeFailed { identity, .. }
            | Self::ChallengeExpired { identity, .. }
            | Self::ChallengeReuseAttempt { identity, .. }
            | Self::ChallengeMaxAttempts { identity, .. }
            | Self::SessionCreated { identity, .. }
            | Self::SessionEvicted { identity, .. }
            | Self::SessionIpMismatch { identity, .. }
            | Self::SessionTerminated { identity, .. } => Some(identity),
            Self::BruteForceBurst { .. }
            | Self::SustainedAttack { .. }
            | Self::FingerprintMarkedSuspicious { .. } => None,
        }
    }

    /// Source IP, when the event has one.
    #[must_use]
    pub const fn ip_address(&self) -> Option<IpAddr> {
        match self {
            Self::LoginSucceeded { ip_address, .. }
            | Self::LoginFailed { ip_address, .. }
            | Self::BruteForceBurst { ip_address, .. }
            | Self::SustainedAttack { ip_address, .. }
            | Self::FingerprintRejected { ip_address, .. }
            | Self::RiskAssessed { ip_address, .. }
            | Self::ChallengeCreated { ip_address, .. }
            | Self::ChallengeReuseAttempt { ip_address, .. }
            | Self::SessionCreated { ip_address, .. } => Some(*ip_address),
            Self::SessionIpMismatch { presented_ip, .. } => Some(*presented_ip),
            Self::LockoutTriggered { .. }
            | Self::LockoutCleared { .. }
            | Self::ManualUnlock { .. }
            | Self::FingerprintMarkedSuspicious { .. }
            | Self::ChallengeCompleted { .. }
            | Self::ChallengeFailed { .. }
            | Self::ChallengeExpired { .. }
            | Self::ChallengeMaxAttempts { .. }
            | Self::SessionEvicted { .. }
            | Self::SessionTerminated { .. } => None,
        }
    }

    /// Success/failure classification for metric folding.
    #[must_use]
    pub const fn outcome(&self) -> EventOutcome {
        match self {
            Self::LoginFailed { .. }
            | Self::LockoutTriggered { .. }
            | Self::BruteForceBurst { .. }
            | Self::SustainedAttack { .. }
            | Self::FingerprintRejected { .. }
            | Self::ChallengeFailed { .. }
            | Self::ChallengeExpired { .. }
            | Self::ChallengeReuseAttempt { .. }
            | Self::ChallengeMaxAttempts { .. }
            | Self::SessionIpMismatch { .. } => EventOutcome::Failure,
            Self::LoginSucceeded { .. }
            | Self::LockoutCleared { .. }
            | Self::ManualUnlock { .. }
            | Self::FingerprintMarkedSuspicious { .. }
            | Self::RiskAssessed { .. }
            | Self::ChallengeCreated { .. }
            | Self::ChallengeCompleted { .. }
            | Self::SessionCreated { .. }
            | Self::SessionEvicted { .. }
            | Self::SessionTerminated { .. } => EventOutcome::Success,
        }
    }

    /// When the event occurred.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::LoginSucceeded { occurred_at, .. }
            | Self::LoginFailed { occurred_at, .. }
            | Self::LockoutTriggered { occurred_at, .. }
            | Self::LockoutCleared { occurred_at, .. }
            | Self::ManualUnlock { occurred_at, .. }
            | Self::BruteForceBurst { occurred_at, .. }
            | Self::SustainedAttack { occurred_at, .. }
            | Self::FingerprintRejected { occurred_at, .. }
            | Self::FingerprintMarkedSuspicious { occurred_at, .. }
            | Self::RiskAssessed { occurred_at, .. }
            | Self::ChallengeCreated { occurred_at, .. }
            | Self::ChallengeCompleted { occurred_at, .. }
            | Self::ChallengeFailed { occurred_at, .. }
            | Self::ChallengeExpired { occurred_at, .. }
            | Self::ChallengeReuseAttempt { occurred_at, .. }
            | Self::ChallengeMaxAttempts { occurred_at, .. }
            | Self::SessionCreated { occurred_at, .. }
            | Self::SessionEvicted { occurred_at, .. }
            | Self::SessionIpMismatch { occurred_at, .. }
            | Self::SessionTerminated { occurred_at, .. } => *occurred_at,
        }
    }
}
