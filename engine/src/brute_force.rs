//! Per-source-IP attack pattern detection.
//!
//! Tracks attempt bursts per IP and flags two patterns: a burst (more than
//! the burst threshold inside a 30 second span) and a sustained attack
//! (more than the sustained threshold inside 5 minutes). Both rules look at
//! the span between the first and last attempt of the current episode, so
//! stale entries can be evicted without changing any answer.

use crate::clock::Clock;
use crate::config::BruteForceConfig;
use crate::events::SecurityEvent;
use crate::providers::AuditSink;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct AttemptEpisode {
    attempt_count: u32,
    first_attempt: DateTime<Utc>,
    last_attempt: DateTime<Utc>,
    user_agent: String,
    burst_reported: bool,
    sustained_reported: bool,
}

impl AttemptEpisode {
    fn new(now: DateTime<Utc>, user_agent: &str) -> Self {
        Self {
            attempt_count: 0,
            first_attempt: now,
            last_attempt: now,
            user_agent: user_agent.to_owned(),
            burst_reported: false,
            sustained_reported: false,
        }
    }

    fn burst_holds(&self, config: &BruteForceConfig) -> bool {
        self.last_attempt - self.first_attempt <= config.burst_window
            && self.attempt_count > config.burst_threshold
    }

    fn sustained_holds(&self, config: &BruteForceConfig) -> bool {
        self.last_attempt - self.first_attempt <= config.sustained_window
            && self.attempt_count > config.sustained_threshold
    }
}

/// Per-IP brute force detector.
pub struct BruteForceDetector {
    episodes: DashMap<IpAddr, AttemptEpisode>,
    config: BruteForceConfig,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl BruteForceDetector {
    /// Create a detector with no prior history.
    #[must_use]
    pub fn new(config: BruteForceConfig, clock: Arc<dyn Clock>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            episodes: DashMap::new(),
            config,
            clock,
            audit,
        }
    }

    /// Record one failed attempt from `ip`.
    ///
    /// Each pattern is reported once per episode; the detection predicate
    /// itself stays point-in-time (see [`Self::is_suspected_attacker`]).
    pub fn record(&self, ip: IpAddr, user_agent: &str) {
        let now = self.clock.now();
        let mut episode = self
            .episodes
            .entry(ip)
            .or_insert_with(|| AttemptEpisode::new(now, user_agent));

        episode.attempt_count += 1;
        episode.last_attempt = now;
        episode.user_agent = user_agent.to_owned();

        if episode.burst_holds(&self.config) && !episode.burst_reported {
            episode.burst_reported = true;
            tracing::warn!(
                ip = %ip,
                attempts = episode.attempt_count,
                "burst attack pattern detected"
            );
            self.audit.append(SecurityEvent::BruteForceBurst {
                ip_address: ip,
                attempt_count: episode.attempt_count,
                user_agent: episode.user_agent.clone(),
                occurred_at: now,
            });
        }

        if episode.sustained_holds(&self.config) && !episode.sustained_reported {
            episode.sustained_reported = true;
            tracing::warn!(
                ip = %ip,
                attempts = episode.attempt_count,
                "sustained attack pattern detected"
            );
            self.audit.append(SecurityEvent::SustainedAttack {
                ip_address: ip,
                attempt_count: episode.attempt_count,
                occurred_at: now,
            });
        }
    }

    /// Whether either attack rule currently holds for `ip`.
    #[must_use]
    pub fn is_suspected_attacker(&self, ip: IpAddr) -> bool {
        self.episodes.get(&ip).is_some_and(|episode| {
            episode.burst_holds(&self.config) || episode.sustained_holds(&self.config)
        })
    }

    /// Attempts recorded for `ip` in the current episode.
    #[must_use]
    pub fn attempt_count(&self, ip: IpAddr) -> u32 {
        self.episodes
            .get(&ip)
            .map_or(0, |episode| episode.attempt_count)
    }

    /// Evict episodes whose last attempt is older than the stale window.
    pub fn sweep_stale(&self) {
        let cutoff = self.clock.now() - self.config.stale_after;
        self.episodes
            .retain(|_, episode| episode.last_attempt >= cutoff);
    }

    /// Number of IPs currently tracked.
    #[must_use]
    pub fn tracked_sources(&self) -> usize {
        self.episodes.len()
    }
}
