//! Audit trail persistence trait.

use crate::events::SecurityEvent;
use chrono::{DateTime, Utc};

/// Append-only audit trail.
///
/// Every component emits [`SecurityEvent`]s into the sink; the aggregator
/// reads the trailing window back out. The trait is synchronous and
/// object-safe so a single `Arc<dyn AuditSink>` can be shared across all
/// components — implementations that persist remotely should buffer
/// internally rather than block the request path.
pub trait AuditSink: Send + Sync {
    /// Append one event. Must not block on I/O.
    fn append(&self, event: SecurityEvent);

    /// Return all events that occurred at or after `cutoff`.
    fn events_since(&self, cutoff: DateTime<Utc>) -> Vec<SecurityEvent>;
}
