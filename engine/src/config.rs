//! Protection engine configuration.
//!
//! Configuration values are provided by the embedding application, not
//! hardcoded. Every knob has a production-sensible default; builders allow
//! overriding individual values.

use chrono::Duration;

/// Account lockout configuration.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Consecutive failures that trigger a lock.
    ///
    /// Default: 5
    pub max_failed_attempts: u32,

    /// How long a triggered lock holds.
    ///
    /// Default: 30 minutes
    pub lockout_duration: Duration,
}

impl LockoutConfig {
    /// Set the failure threshold.
    #[must_use]
    pub const fn with_max_failed_attempts(mut self, attempts: u32) -> Self {
        self.max_failed_attempts = attempts;
        self
    }

    /// Set the lock duration.
    #[must_use]
    pub const fn with_lockout_duration(mut self, duration: Duration) -> Self {
        self.lockout_duration = duration;
        self
    }
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_duration: Duration::minutes(30),
        }
    }
}

/// Brute force detection configuration.
#[derive(Debug, Clone)]
pub struct BruteForceConfig {
    /// Burst rule: window in which `burst_threshold` attempts flag an IP.
    ///
    /// Default: 30 seconds
    pub burst_window: Duration,

    /// Burst rule: attempt count that must be exceeded within the window.
    ///
    /// Default: 10
    pub burst_threshold: u32,

    /// Sustained rule: window in which `sustained_threshold` attempts flag an IP.
    ///
    /// Default: 5 minutes
    pub sustained_window: Duration,

    /// Sustained rule: attempt count that must be exceeded within the window.
    ///
    /// Default: 30
    pub sustained_threshold: u32,

    /// Entries whose last attempt is older than this are evictable.
    ///
    /// Default: 1 hour
    pub stale_after: Duration,
}

impl BruteForceConfig {
    /// Set the burst rule.
    #[must_use]
    pub const fn with_burst_rule(mut self, window: Duration, threshold: u32) -> Self {
        self.burst_window = window;
        self.burst_threshold = threshold;
        self
    }

    /// Set the sustained rule.
    #[must_use]
    pub const fn with_sustained_rule(mut self, window: Duration, threshold: u32) -> Self {
        self.sustained_window = window;
        self.sustained_threshold = threshold;
        self
    }
}

impl Default for BruteForceConfig {
    fn default() -> Self {
        Self {
            burst_window: Duration::seconds(30),
            burst_threshold: 10,
            sustained_window: Duration::minutes(5),
            sustained_threshold: 30,
            stale_after: Duration::hours(1),
        }
    }
}

/// Device trust configuration.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Trust score at or above which a device is considered trusted.
    ///
    /// Default: 0.7
    pub trust_threshold: f64,

    /// Trust score assigned to a newly observed fingerprint.
    ///
    /// Default: 0.5
    pub initial_trust: f64,

    /// Usage count beyond which consistent usage starts earning trust.
    ///
    /// Default: 10
    pub consistency_threshold: u32,

    /// Trust earned per consistent use past the consistency threshold.
    ///
    /// Default: 0.05
    pub growth_increment: f64,

    /// Trust lost when the fingerprint shows up from a new IP.
    ///
    /// Default: 0.2
    pub churn_penalty: f64,
}

impl DeviceConfig {
    /// Set the trusted-device threshold.
    #[must_use]
    pub const fn with_trust_threshold(mut self, threshold: f64) -> Self {
        self.trust_threshold = threshold;
        self
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            trust_threshold: 0.7,
            initial_trust: 0.5,
            consistency_threshold: 10,
            growth_increment: 0.05,
            churn_penalty: 0.2,
        }
    }
}

/// Risk scoring configuration.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Score at or above which the level is `Medium`.
    ///
    /// Default: 35.0
    pub medium_threshold: f64,

    /// Score at or above which the level is `High`.
    ///
    /// Default: 60.0
    pub high_threshold: f64,

    /// Score at or above which the level is `Critical`.
    ///
    /// Default: 80.0
    pub critical_threshold: f64,

    /// Distance beyond which a location change is implausible.
    ///
    /// Default: 500 km
    pub travel_distance_km: f64,

    /// Elapsed time under which the implausible distance counts.
    ///
    /// Default: 2 hours
    pub travel_window: Duration,

    /// Window for the assessment-velocity signal.
    ///
    /// Default: 5 minutes
    pub velocity_window: Duration,

    /// Assessment count that must be exceeded within the velocity window.
    ///
    /// Default: 10
    pub velocity_threshold: usize,

    /// Window for counting prior high-risk assessments.
    ///
    /// Default: 24 hours
    pub behavior_window: Duration,

    /// Upper bound on a geolocation lookup before it is treated as absent.
    ///
    /// Default: 5 seconds
    pub geo_timeout: Duration,
}

impl RiskConfig {
    /// Set the level thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, medium: f64, high: f64, critical: f64) -> Self {
        self.medium_threshold = medium;
        self.high_threshold = high;
        self.critical_threshold = critical;
        self
    }

    /// Set the geolocation lookup bound.
    #[must_use]
    pub const fn with_geo_timeout(mut self, timeout: Duration) -> Self {
        self.geo_timeout = timeout;
        self
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            medium_threshold: 35.0,
            high_threshold: 60.0,
            critical_threshold: 80.0,
            travel_distance_km: 500.0,
            travel_window: Duration::hours(2),
            velocity_window: Duration::minutes(5),
            velocity_threshold: 10,
            behavior_window: Duration::hours(24),
            geo_timeout: Duration::seconds(5),
        }
    }
}

/// Security challenge configuration.
#[derive(Debug, Clone)]
pub struct ChallengeConfig {
    /// Verification attempts before exhaustion is reported.
    ///
    /// Default: 3
    pub max_attempts: u32,

    /// Challenge time-to-live.
    ///
    /// Default: 30 minutes
    pub expiry: Duration,
}

impl ChallengeConfig {
    /// Set the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the challenge time-to-live.
    #[must_use]
    pub const fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            expiry: Duration::minutes(30),
        }
    }
}

/// Session accounting configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Concurrent active sessions allowed per identity.
    ///
    /// Default: 3
    pub max_concurrent_sessions: usize,

    /// Inactivity window after which a session stops counting and is
    /// deactivated on next touch.
    ///
    /// Default: 30 minutes
    pub inactivity_timeout: Duration,

    /// Absolute session lifetime.
    ///
    /// Default: 24 hours
    pub session_ttl: Duration,
}

impl SessionConfig {
    /// Set the concurrency limit.
    #[must_use]
    pub const fn with_max_concurrent_sessions(mut self, max: usize) -> Self {
        self.max_concurrent_sessions = max;
        self
    }

    /// Set the inactivity timeout.
    #[must_use]
    pub const fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Set the absolute session lifetime.
    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 3,
            inactivity_timeout: Duration::minutes(30),
            session_ttl: Duration::hours(24),
        }
    }
}

/// Audit aggregation and alerting configuration.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Trailing window each aggregation cycle examines.
    ///
    /// Default: 5 minutes
    pub aggregation_window: Duration,

    /// Recipient for anomaly alerts.
    pub alert_recipient: String,

    /// Alerts delivered per recipient per hour before throttling.
    ///
    /// Default: 5
    pub alert_cap_per_hour: usize,
}

impl AuditConfig {
    /// Set the alert recipient.
    #[must_use]
    pub fn with_alert_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.alert_recipient = recipient.into();
        self
    }

    /// Set the per-recipient alert cap.
    #[must_use]
    pub const fn with_alert_cap_per_hour(mut self, cap: usize) -> Self {
        self.alert_cap_per_hour = cap;
        self
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            aggregation_window: Duration::minutes(5),
            alert_recipient: "security@localhost".to_string(),
            alert_cap_per_hour: 5,
        }
    }
}

/// Top-level configuration for the protection engine.
#[derive(Debug, Clone, Default)]
pub struct ProtectionConfig {
    /// Lockout policy.
    pub lockout: LockoutConfig,

    /// Brute force detection policy.
    pub brute_force: BruteForceConfig,

    /// Device trust policy.
    pub device: DeviceConfig,

    /// Risk scoring policy.
    pub risk: RiskConfig,

    /// Challenge policy.
    pub challenge: ChallengeConfig,

    /// Session policy.
    pub session: SessionConfig,

    /// Audit aggregation policy.
    pub audit: AuditConfig,
}

impl ProtectionConfig {
    /// Create a configuration with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the lockout policy.
    #[must_use]
    pub fn with_lockout(mut self, lockout: LockoutConfig) -> Self {
        self.lockout = lockout;
        self
    }

    /// Replace the brute force policy.
    #[must_use]
    pub fn with_brute_force(mut self, brute_force: BruteForceConfig) -> Self {
        self.brute_force = brute_force;
        self
    }

    /// Replace the device trust policy.
    #[must_use]
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Replace the risk policy.
    #[must_use]
    pub fn with_risk(mut self, risk: RiskConfig) -> Self {
        self.risk = risk;
        self
    }

    /// Replace the challenge policy.
    #[must_use]
    pub fn with_challenge(mut self, challenge: ChallengeConfig) -> Self {
        self.challenge = challenge;
        self
    }

    /// Replace the session policy.
    #[must_use]
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Replace the audit policy.
    #[must_use]
    pub fn with_audit(mut self, audit: AuditConfig) -> Self {
        self.audit = audit;
        self
    }
}
