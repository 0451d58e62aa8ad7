//! Mock notifier for testing.

use crate::error::{GuardError, Result};
use crate::providers::Notifier;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A notification captured by [`MockNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    /// Recipient it was addressed to.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Structured body.
    pub body: serde_json::Value,
}

/// In-memory notifier that records instead of delivering.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<SentNotification>>>,
    failing: Arc<AtomicBool>,
}

impl MockNotifier {
    /// Create a notifier that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (simulated outage).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of deliveries so far.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl Notifier for MockNotifier {
    fn notify(
        &self,
        recipient: &str,
        subject: &str,
        body: serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send {
        let sent = Arc::clone(&self.sent);
        let failing = self.failing.load(Ordering::SeqCst);
        let notification = SentNotification {
            recipient: recipient.to_owned(),
            subject: subject.to_owned(),
            body,
        };

        async move {
            if failing {
                return Err(GuardError::Internal("notifier outage".to_string()));
            }
            sent.lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(notification);
            Ok(())
        }
    }
}
