//! Sliding-window counter.
//!
//! Keyed timestamp lists over a sharded map. `count` filters to the
//! look-back window at call time, so eviction is purely a memory concern:
//! lazy pruning on `record` and a background sweep both leave the counting
//! semantics unchanged.

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Entries per key above which `record` prunes opportunistically.
const PRUNE_WATERMARK: usize = 256;

/// Window kept by the opportunistic prune. Wide enough for every caller's
/// largest look-back (the hourly alert throttle).
const PRUNE_RETENTION_HOURS: i64 = 2;

/// Concurrent sliding-window counter keyed by string.
pub struct TimeWindowCounter {
    entries: DashMap<String, Vec<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl TimeWindowCounter {
    /// Create an empty counter.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Record one occurrence for `key` at the current time.
    pub fn record(&self, key: &str) {
        let now = self.clock.now();
        let mut timestamps = self.entries.entry(key.to_owned()).or_default();
        timestamps.push(now);
        if timestamps.len() > PRUNE_WATERMARK {
            let cutoff = now - Duration::hours(PRUNE_RETENTION_HOURS);
            timestamps.retain(|ts| *ts >= cutoff);
        }
    }

    /// Occurrences for `key` within the trailing `window`.
    #[must_use]
    pub fn count(&self, key: &str, window: Duration) -> usize {
        let cutoff = self.clock.now() - window;
        self.entries
            .get(key)
            .map_or(0, |timestamps| {
                timestamps.iter().filter(|ts| **ts >= cutoff).count()
            })
    }

    /// Whether `key` has strictly more than `threshold` occurrences in the window.
    #[must_use]
    pub fn is_over_threshold(&self, key: &str, threshold: usize, window: Duration) -> bool {
        self.count(key, window) > threshold
    }

    /// Drop all occurrences older than `cutoff`; keys left empty are removed.
    pub fn evict_older_than(&self, cutoff: DateTime<Utc>) {
        self.entries.retain(|_, timestamps| {
            timestamps.retain(|ts| *ts >= cutoff);
            !timestamps.is_empty()
        });
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::FixedClock;

    fn counter() -> (Arc<FixedClock>, TimeWindowCounter) {
        let clock = Arc::new(FixedClock::default());
        let counter = TimeWindowCounter::new(Arc::clone(&clock) as Arc<dyn Clock>);
        (clock, counter)
    }

    #[test]
    fn counts_only_entries_inside_the_window() {
        let (clock, counter) = counter();
        counter.record("k");
        counter.record("k");
        clock.advance(Duration::minutes(10));
        counter.record("k");

        assert_eq!(counter.count("k", Duration::minutes(5)), 1);
        assert_eq!(counter.count("k", Duration::hours(1)), 3);
    }

    #[test]
    fn threshold_is_strict() {
        let (_clock, counter) = counter();
        for _ in 0..10 {
            counter.record("k");
        }
        assert!(!counter.is_over_threshold("k", 10, Duration::minutes(1)));
        counter.record("k");
        assert!(counter.is_over_threshold("k", 10, Duration::minutes(1)));
    }

    #[test]
    fn unknown_key_counts_zero() {
        let (_clock, counter) = counter();
        assert_eq!(counter.count("missing", Duration::minutes(5)), 0);
        assert!(!counter.is_over_threshold("missing", 0, Duration::minutes(5)));
    }

    #[test]
    fn eviction_removes_old_entries_and_empty_keys() {
        let (clock, counter) = counter();
        counter.record("old");
        clock.advance(Duration::hours(3));
        counter.record("fresh");

        counter.evict_older_than(clock.now() - Duration::hours(1));
        assert_eq!(counter.tracked_keys(), 1);
        assert_eq!(counter.count("old", Duration::hours(24)), 0);
        assert_eq!(counter.count("fresh", Duration::hours(24)), 1);
    }

    #[test]
    fn eviction_does_not_change_count_semantics() {
        let (clock, counter) = counter();
        counter.record("k");
        clock.advance(Duration::minutes(10));
        counter.record("k");

        let before = counter.count("k", Duration::minutes(5));
        counter.evict_older_than(clock.now() - Duration::minutes(5));
        let after = counter.count("k", Duration::minutes(5));
        assert_eq!(before, after);
    }
}
