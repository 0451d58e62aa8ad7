//! Per-identity failed-attempt tracking and account lockout.
//!
//! State machine per identity: open → (failures accumulate) → locked once
//! the threshold is reached → open again when the lock expires or an
//! operator unlocks. Reads use lazy expiry: a lock whose `locked_until` has
//! passed answers "not locked" without waiting for the sweep to clear it.

use crate::clock::Clock;
use crate::config::LockoutConfig;
use crate::events::SecurityEvent;
use crate::providers::AuditSink;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Failure-tracking record for one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockoutRecord {
    /// Identity the record belongs to.
    pub identity: String,

    /// Consecutive failures since the last success or unlock.
    pub failed_attempts: u32,

    /// When the most recent failure happened.
    pub last_failed_at: DateTime<Utc>,

    /// Whether the identity is locked.
    pub locked: bool,

    /// When the lock expires; set iff `locked`.
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutRecord {
    fn new(identity: &str, now: DateTime<Utc>) -> Self {
        Self {
            identity: identity.to_owned(),
            failed_attempts: 0,
            last_failed_at: now,
            locked: false,
            locked_until: None,
        }
    }

    fn reset(&mut self) {
        self.failed_attempts = 0;
        self.locked = false;
        self.locked_until = None;
    }

    /// Whether the lock currently holds at `now`.
    #[must_use]
    pub fn holds_at(&self, now: DateTime<Utc>) -> bool {
        self.locked && self.locked_until.is_some_and(|until| now < until)
    }
}

/// Per-identity lockout guard.
pub struct LockoutGuard {
    records: DashMap<String, LockoutRecord>,
    config: LockoutConfig,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl LockoutGuard {
    /// Create a guard with no prior history.
    #[must_use]
    pub fn new(config: LockoutConfig, clock: Arc<dyn Clock>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            records: DashMap::new(),
            config,
            clock,
            audit,
        }
    }

    /// Whether the identity is currently locked.
    ///
    /// Lazy-expiry read: an expired lock answers `false` without a write.
    #[must_use]
    pub fn is_locked(&self, identity: &str) -> bool {
        let now = self.clock.now();
        self.records
            .get(identity)
            .is_some_and(|record| record.holds_at(now))
    }

    /// Time left on an active lock, if one holds.
    #[must_use]
    pub fn remaining_lockout(&self, identity: &str) -> Option<Duration> {
        let now = self.clock.now();
        let record = self.records.get(identity)?;
        if !record.holds_at(now) {
            return None;
        }
        record.locked_until.map(|until| until - now)
    }

    /// Record a failed attempt; returns the updated failure count.
    ///
    /// The lock transition happens exactly when the increment reaches the
    /// configured threshold and emits a single audit event.
    pub fn record_failure(&self, identity: &str) -> u32 {
        let now = self.clock.now();
        let mut entry = self
            .records
            .entry(identity.to_owned())
            .or_insert_with(|| LockoutRecord::new(identity, now));

        // An expired lock means the previous episode is over; the incoming
        // failure starts a fresh count.
        if entry.locked && !entry.holds_at(now) {
            entry.reset();
        }

        entry.failed_attempts += 1;
        entry.last_failed_at = now;

        if !entry.locked && entry.failed_attempts >= self.config.max_failed_attempts {
            let locked_until = now + self.config.lockout_duration;
            entry.locked = true;
            entry.locked_until = Some(locked_until);

            tracing::warn!(
                identity = %identity,
                failed_attempts = entry.failed_attempts,
                locked_until = %locked_until,
                "account locked after repeated failures"
            );
            self.audit.append(SecurityEvent::LockoutTriggered {
                identity: identity.to_owned(),
                failed_attempts: entry.failed_attempts,
                locked_until,
                occurred_at: now,
            });
        }

        entry.failed_attempts
    }

    /// Record a successful attempt: counters and lock state reset.
    pub fn record_success(&self, identity: &str) {
        if let Some(mut record) = self.records.get_mut(identity) {
            record.reset();
        }
    }

    /// Administrative unlock. Always succeeds; the actor is recorded.
    pub fn unlock(&self, identity: &str, actor: &str) {
        let now = self.clock.now();
        if let Some(mut record) = self.records.get_mut(identity) {
            record.reset();
        }
        tracing::info!(identity = %identity, actor = %actor, "manual unlock");
        self.audit.append(SecurityEvent::ManualUnlock {
            identity: identity.to_owned(),
            actor: actor.to_owned(),
            occurred_at: now,
        });
    }

    /// Current record for an identity, if any.
    #[must_use]
    pub fn record(&self, identity: &str) -> Option<LockoutRecord> {
        self.records.get(identity).map(|record| record.clone())
    }

    /// Physically clear locks whose expiry has passed and drop fully reset
    /// records. Correctness never depends on this running promptly; reads
    /// already treat expired locks as open.
    pub fn sweep_expired(&self) {
        let now = self.clock.now();
        let mut cleared = Vec::new();

        self.records.retain(|identity, record| {
            if record.locked && !record.holds_at(now) {
                record.reset();
                cleared.push(identity.clone());
            }
            record.locked || record.failed_attempts > 0
        });

        for identity in cleared {
            self.audit.append(SecurityEvent::LockoutCleared {
                identity,
                occurred_at: now,
            });
        }
    }
}
