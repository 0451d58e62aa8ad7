//! Audit-event aggregation and anomaly alerting.
//!
//! Each cycle folds the trailing window of the audit trail into per-kind
//! metrics and raises named anomaly alerts through the notifier. Metrics
//! are ephemeral: rebuilt every cycle, never persisted. Alert delivery is
//! throttled per recipient so an incident does not become an alert storm.

use crate::clock::Clock;
use crate::config::AuditConfig;
use crate::events::{EventKind, EventOutcome};
use crate::providers::{AuditSink, Notifier};
use crate::window::TimeWindowCounter;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

/// Rolling metrics for one event kind within the aggregation window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetric {
    /// Event kind the metric describes.
    pub kind: EventKind,

    /// Events observed in the window.
    pub total_count: usize,

    /// Events classified as success.
    pub success_count: usize,

    /// Events classified as failure.
    pub failure_count: usize,

    /// Distinct identities involved.
    pub unique_identities: HashSet<String>,

    /// Distinct source addresses involved.
    pub unique_ips: HashSet<IpAddr>,

    /// Earliest event in the window.
    pub first_seen: DateTime<Utc>,

    /// Latest event in the window.
    pub last_seen: DateTime<Utc>,
}

impl EventMetric {
    fn new(kind: EventKind, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            total_count: 0,
            success_count: 0,
            failure_count: 0,
            unique_identities: HashSet::new(),
            unique_ips: HashSet::new(),
            first_seen: at,
            last_seen: at,
        }
    }

    /// Failure share of the window, zero when empty.
    #[must_use]
    pub fn failure_ratio(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.failure_count as f64 / self.total_count as f64
        }
    }
}

/// Named anomaly patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    /// Failure share above 70% with meaningful volume.
    HighFailureRate,
    /// Raw volume spike inside one window.
    ActivitySpike,
    /// Many failures across many source addresses.
    DistributedAttack,
}

impl AnomalyKind {
    /// Stable name for alert payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HighFailureRate => "HIGH_FAILURE_RATE",
            Self::ActivitySpike => "ACTIVITY_SPIKE",
            Self::DistributedAttack => "DISTRIBUTED_ATTACK",
        }
    }
}

/// Scheduled audit aggregation and alerting.
pub struct AuditAggregator<N: Notifier> {
    sink: Arc<dyn AuditSink>,
    notifier: N,
    alert_throttle: TimeWindowCounter,
    latest: Mutex<HashMap<EventKind, EventMetric>>,
    config: AuditConfig,
    clock: Arc<dyn Clock>,
}

impl<N: Notifier> AuditAggregator<N> {
    /// Create an aggregator with no prior cycle.
    #[must_use]
    pub fn new(
        config: AuditConfig,
        sink: Arc<dyn AuditSink>,
        notifier: N,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sink,
            notifier,
            alert_throttle: TimeWindowCounter::new(Arc::clone(&clock)),
            latest: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Run one aggregation cycle: rebuild metrics from the trailing window
    /// and deliver anomaly alerts. Alert failures are logged, never raised.
    pub async fn run_cycle(&self) {
        let now = self.clock.now();
        let events = self.sink.events_since(now - self.config.aggregation_window);

        let mut metrics: HashMap<EventKind, EventMetric> = HashMap::new();
        for event in &events {
            let at = event.occurred_at();
            let metric = metrics
                .entry(event.kind())
                .or_insert_with(|| EventMetric::new(event.kind(), at));
            metric.total_count += 1;
            match event.outcome() {
                EventOutcome::Success => metric.success_count += 1,
                EventOutcome::Failure => metric.failure_count += 1,
            }
            if let Some(identity) = event.identity() {
                metric.unique_identities.insert(identity.to_owned());
            }
            if let Some(ip) = event.ip_address() {
                metric.unique_ips.insert(ip);
            }
            metric.first_seen = metric.first_seen.min(at);
            metric.last_seen = metric.last_seen.max(at);
        }

        let anomalies: Vec<(AnomalyKind, EventMetric)> = metrics
            .values()
            .flat_map(|metric| {
                detect_anomalies(metric)
                    .into_iter()
                    .map(|anomaly| (anomaly, metric.clone()))
            })
            .collect();

        for (anomaly, metric) in anomalies {
            self.deliver_alert(anomaly, &metric).await;
        }

        tracing::debug!(
            events = events.len(),
            kinds = metrics.len(),
            "aggregation cycle complete"
        );
        *self
            .latest
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = metrics;
    }

    /// Metrics from the most recent cycle.
    #[must_use]
    pub fn latest_metrics(&self) -> Vec<EventMetric> {
        self.latest
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    async fn deliver_alert(&self, anomaly: AnomalyKind, metric: &EventMetric) {
        let recipient = self.config.alert_recipient.clone();
        let delivered = self
            .alert_throttle
            .count(&recipient, Duration::hours(1));
        if delivered >= self.config.alert_cap_per_hour {
            tracing::warn!(
                recipient = %recipient,
                anomaly = anomaly.as_str(),
                event_kind = metric.kind.as_str(),
                "alert suppressed: per-recipient cap reached"
            );
            return;
        }

        let subject = format!("{} on {}", anomaly.as_str(), metric.kind.as_str());
        let body = serde_json::json!({
            "anomaly": anomaly.as_str(),
            "event_kind": metric.kind.as_str(),
            "total_count": metric.total_count,
            "failure_count": metric.failure_count,
            "unique_identities": metric.unique_identities.len(),
            "unique_ips": metric.unique_ips.len(),
            "window_start": metric.first_seen,
            "window_end": metric.last_seen,
        });

        self.alert_throttle.record(&recipient);
        if let Err(err) = self.notifier.notify(&recipient, &subject, body).await {
            tracing::error!(
                recipient = %recipient,
                anomaly = anomaly.as_str(),
                error = %err,
                "anomaly alert delivery failed"
            );
        }
    }
}

/// Anomaly rules over one metric.
fn detect_anomalies(metric: &EventMetric) -> Vec<AnomalyKind> {
    let mut anomalies = Vec::new();
    if metric.total_count > 10 && metric.failure_ratio() > 0.7 {
        anomalies.push(AnomalyKind::HighFailureRate);
    }
    if metric.total_count > 100 {
        anomalies.push(AnomalyKind::ActivitySpike);
    }
    if metric.unique_ips.len() > 20 && metric.failure_count > 50 {
        anomalies.push(AnomalyKind::DistributedAttack);
    }
    anomalies
}
