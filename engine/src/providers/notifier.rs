//! Operator notification trait.

use crate::error::Result;
use std::future::Future;

/// Outbound notification delivery.
///
/// Used by the audit aggregator to alert operators about anomalies.
/// Delivery is fire-and-forget from the engine's perspective: failures are
/// logged by the caller and never propagate into request handling.
pub trait Notifier: Send + Sync {
    /// Deliver a structured notification.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails; callers recover locally.
    fn notify(
        &self,
        recipient: &str,
        subject: &str,
        body: serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send;
}
