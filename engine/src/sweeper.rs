//! Periodic maintenance tasks.
//!
//! Each sweep concern runs on its own tokio interval task, independent of
//! the request path. Sweeps are idempotent and purely defensive: point-in-
//! time reads stay correct even if a sweep never runs. A slow or failed
//! cycle delays only its own loop.

use crate::engine::ProtectionEngine;
use crate::providers::{CredentialVerifier, GeoLocator, Notifier};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// How often each maintenance concern runs.
#[derive(Debug, Clone)]
pub struct SweepIntervals {
    /// Expired-lock clearing.
    pub lockout: Duration,
    /// Stale brute-force episode eviction.
    pub brute_force: Duration,
    /// Challenge expiry marking.
    pub challenge: Duration,
    /// Session expiry and pruning.
    pub session: Duration,
    /// Risk history pruning.
    pub risk_history: Duration,
    /// Audit aggregation and alerting cycle.
    pub aggregation: Duration,
}

impl Default for SweepIntervals {
    fn default() -> Self {
        Self {
            lockout: Duration::from_secs(60),
            brute_force: Duration::from_secs(600),
            challenge: Duration::from_secs(60),
            session: Duration::from_secs(300),
            risk_history: Duration::from_secs(3600),
            aggregation: Duration::from_secs(300),
        }
    }
}

/// Handle over the running maintenance tasks.
pub struct Sweeper {
    handles: Vec<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn all maintenance tasks for an engine.
    #[must_use]
    pub fn start<V, N, G>(engine: &ProtectionEngine<V, N, G>, intervals: SweepIntervals) -> Self
    where
        V: CredentialVerifier,
        N: Notifier + 'static,
        G: GeoLocator + 'static,
    {
        let targets = engine.sweep_targets();

        let lockout = targets.lockout;
        let brute_force = targets.brute_force;
        let challenges = targets.challenges;
        let sessions = targets.sessions;
        let risk = targets.risk;
        let aggregator = targets.aggregator;

        let handles = vec![
            spawn_periodic(intervals.lockout, "lockout", move || {
                lockout.sweep_expired();
            }),
            spawn_periodic(intervals.brute_force, "brute_force", move || {
                brute_force.sweep_stale();
            }),
            spawn_periodic(intervals.challenge, "challenge", move || {
                challenges.sweep_expired();
            }),
            spawn_periodic(intervals.session, "session", move || {
                sessions.sweep_expired();
            }),
            spawn_periodic(intervals.risk_history, "risk_history", move || {
                risk.sweep_history();
            }),
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(intervals.aggregation);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    aggregator.run_cycle().await;
                }
            }),
        ];

        Self { handles }
    }

    /// Number of running tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Stop all maintenance tasks.
    pub fn shutdown(self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

fn spawn_periodic<F>(period: Duration, name: &'static str, tick: F) -> JoinHandle<()>
where
    F: Fn() + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            tracing::trace!(task = name, "sweep tick");
            tick();
        }
    })
}
