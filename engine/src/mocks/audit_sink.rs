//! In-memory audit sink.

use crate::events::{EventKind, SecurityEvent};
use crate::providers::AuditSink;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Append-only in-memory audit trail.
///
/// The default sink for single-process deployments and tests. A
/// database-backed sink would implement the same trait behind an internal
/// buffer.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event appended so far.
    #[must_use]
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of appended events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, event: SecurityEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }

    fn events_since(&self, cutoff: DateTime<Utc>) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|event| event.occurred_at() >= cutoff)
            .cloned()
            .collect()
    }
}
