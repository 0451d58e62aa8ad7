//! Risk scoring.
//!
//! Each assessment folds four independent signal categories — location,
//! time, behavior, incident — into a score. A category only participates
//! when at least one of its signals triggered; the score is the arithmetic
//! mean of the participating categories, so an identity with nothing
//! suspicious about it scores zero rather than "low everything".

use crate::challenge::{ChallengeManager, ChallengeType};
use crate::clock::Clock;
use crate::config::RiskConfig;
use crate::events::SecurityEvent;
use crate::providers::{AuditSink, GeoLocation, GeoLocator};
use chrono::{DateTime, Timelike, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

/// Risk level derived from the score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RiskLevel {
    /// Nothing suspicious; proceed.
    Low,
    /// Worth a lightweight verification.
    Medium,
    /// Gate the action behind additional authentication.
    High,
    /// Block and escalate.
    Critical,
}

impl RiskLevel {
    /// Stable name for logs and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Category of action being assessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssessmentKind {
    /// Interactive authentication.
    Login,
    /// Money movement.
    PaymentTransaction,
    /// Privileged operation.
    AdminAction,
    /// Contact/credential detail change.
    ProfileUpdate,
}

impl AssessmentKind {
    /// Baseline behavior-risk contribution for this action category.
    #[must_use]
    pub const fn baseline(self) -> f64 {
        match self {
            Self::PaymentTransaction => 25.0,
            Self::AdminAction => 20.0,
            Self::ProfileUpdate => 15.0,
            Self::Login => 0.0,
        }
    }

    /// Stable name for logs and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::PaymentTransaction => "PAYMENT_TRANSACTION",
            Self::AdminAction => "ADMIN_ACTION",
            Self::ProfileUpdate => "PROFILE_UPDATE",
        }
    }
}

/// What the caller should do about an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    /// No extra friction.
    Proceed,
    /// Ask for an email verification round-trip.
    RequireEmailVerification,
    /// Ask for a second authentication factor.
    RequireAdditionalAuth,
    /// Tell the account owner something unusual happened.
    NotifyUser,
    /// Keep watching this identity.
    Monitor,
    /// Refuse the action.
    Block,
    /// Force a credential reset before anything else.
    ForcePasswordReset,
    /// Require a human operator to approve.
    RequireAdminVerification,
}

/// One recorded risk assessment. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Assessed identity.
    pub identity: String,

    /// Source address.
    pub ip_address: IpAddr,

    /// User agent presented with the action.
    pub user_agent: String,

    /// Overall score: mean of the triggered factor categories.
    pub score: f64,

    /// Level derived from the score.
    pub level: RiskLevel,

    /// Triggered factor categories and their values.
    pub factors: BTreeMap<String, f64>,

    /// What the caller should do.
    pub recommended_actions: Vec<RecommendedAction>,

    /// Action category that was assessed.
    pub kind: AssessmentKind,

    /// When the assessment was recorded.
    pub created_at: DateTime<Utc>,
}

/// Risk engine: factor computation, level mapping, challenge triggering.
pub struct RiskEngine<G: GeoLocator> {
    geo: G,
    history: DashMap<String, Vec<RiskAssessment>>,
    last_location: DashMap<String, (GeoLocation, DateTime<Utc>)>,
    challenges: Arc<ChallengeManager>,
    config: RiskConfig,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl<G: GeoLocator> RiskEngine<G> {
    /// Create an engine with no prior history.
    #[must_use]
    pub fn new(
        config: RiskConfig,
        geo: G,
        challenges: Arc<ChallengeManager>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            geo,
            history: DashMap::new(),
            last_location: DashMap::new(),
            challenges,
            config,
            clock,
            audit,
        }
    }

    /// Assess one action. Always records the assessment; at `High` or above
    /// it additionally flags the event and ensures a risk-based challenge
    /// is pending for the identity.
    pub async fn assess(
        &self,
        identity: &str,
        ip: IpAddr,
        user_agent: &str,
        kind: AssessmentKind,
    ) -> RiskAssessment {
        let now = self.clock.now();
        let mut factors = BTreeMap::new();

        if let Some(value) = self.location_factor(identity, ip, now).await {
            factors.insert("location".to_string(), value);
        }
        if let Some(value) = self.time_factor(identity, now) {
            factors.insert("time".to_string(), value);
        }
        if let Some(value) = self.behavior_factor(identity, kind, now) {
            factors.insert("behavior".to_string(), value);
        }
        if self.challenges.has_active_challenge(identity) {
            factors.insert("incident".to_string(), 25.0);
        }

        // Absence of evidence is not evidence of risk: no triggered factor
        // means a zero score, not a "low" average.
        let score = if factors.is_empty() {
            0.0
        } else {
            factors.values().sum::<f64>() / factors.len() as f64
        };
        let level = self.level_for(score);

        let assessment = RiskAssessment {
            identity: identity.to_owned(),
            ip_address: ip,
            user_agent: user_agent.to_owned(),
            score,
            level,
            factors,
            recommended_actions: recommended_actions(level),
            kind,
            created_at: now,
        };

        self.audit.append(SecurityEvent::RiskAssessed {
            identity: identity.to_owned(),
            ip_address: ip,
            score,
            level,
            kind,
            occurred_at: now,
        });

        if level >= RiskLevel::High {
            tracing::warn!(
                identity = %identity,
                ip = %ip,
                level = level.as_str(),
                kind = kind.as_str(),
                "elevated risk detected"
            );
            if !self.challenges.has_active_challenge(identity) {
                self.challenges
                    .create(identity, ChallengeType::RiskBased, ip, user_agent);
            }
        }

        self.history
            .entry(identity.to_owned())
            .or_default()
            .push(assessment.clone());

        assessment
    }

    /// Recorded assessments for an identity, oldest first.
    #[must_use]
    pub fn assessment_history(&self, identity: &str) -> Vec<RiskAssessment> {
        self.history
            .get(identity)
            .map(|assessments| assessments.clone())
            .unwrap_or_default()
    }

    /// Prune assessment history and location memory beyond the behavior
    /// window. The behavior factor never looks further back, so this is a
    /// pure memory bound.
    pub fn sweep_history(&self) {
        let cutoff = self.clock.now() - self.config.behavior_window;
        self.history.retain(|_, assessments| {
            assessments.retain(|a| a.created_at >= cutoff);
            !assessments.is_empty()
        });
        self.last_location
            .retain(|_, (_, seen_at)| *seen_at >= cutoff);
    }

    /// Implausible-travel signal. Resolves the current IP with a bounded
    /// lookup; any failure or timeout degrades to "no signal".
    async fn location_factor(
        &self,
        identity: &str,
        ip: IpAddr,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        let timeout = self
            .config
            .geo_timeout
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(5));

        let located = match tokio::time::timeout(timeout, self.geo.locate(ip)).await {
            Ok(Ok(located)) => located,
            Ok(Err(err)) => {
                tracing::debug!(ip = %ip, error = %err, "geolocation lookup failed");
                None
            }
            Err(_) => {
                tracing::debug!(ip = %ip, "geolocation lookup timed out");
                None
            }
        };
        let current = located?;

        let triggered = self.last_location.get(identity).is_some_and(|entry| {
            let (previous, seen_at) = entry.value();
            now - *seen_at < self.config.travel_window
                && previous.distance_km(&current) > self.config.travel_distance_km
        });

        self.last_location
            .insert(identity.to_owned(), (current, now));

        triggered.then_some(30.0)
    }

    /// Odd-hour and assessment-velocity signals.
    fn time_factor(&self, identity: &str, now: DateTime<Utc>) -> Option<f64> {
        let mut value = 0.0;
        if now.hour() <= 4 {
            value += 20.0;
        }
        let recent = self
            .history
            .get(identity)
            .map_or(0, |assessments| {
                let cutoff = now - self.config.velocity_window;
                assessments.iter().filter(|a| a.created_at >= cutoff).count()
            });
        if recent > self.config.velocity_threshold {
            value += 25.0;
        }
        (value > 0.0).then_some(value)
    }

    /// Prior-incident and action-category signals.
    fn behavior_factor(
        &self,
        identity: &str,
        kind: AssessmentKind,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        let cutoff = now - self.config.behavior_window;
        let high_count = self
            .history
            .get(identity)
            .map_or(0, |assessments| {
                assessments
                    .iter()
                    .filter(|a| a.created_at >= cutoff && a.level >= RiskLevel::High)
                    .count()
            });

        let value = 20.0 * high_count as f64 + kind.baseline();
        (value > 0.0).then_some(value)
    }

    fn level_for(&self, score: f64) -> RiskLevel {
        if score >= self.config.critical_threshold {
            RiskLevel::Critical
        } else if score >= self.config.high_threshold {
            RiskLevel::High
        } else if score >= self.config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Caller guidance per level.
fn recommended_actions(level: RiskLevel) -> Vec<RecommendedAction> {
    match level {
        RiskLevel::Critical => vec![
            RecommendedAction::Block,
            RecommendedAction::ForcePasswordReset,
            RecommendedAction::RequireAdminVerification,
        ],
        RiskLevel::High => vec![
            RecommendedAction::RequireAdditionalAuth,
            RecommendedAction::NotifyUser,
            RecommendedAction::Monitor,
        ],
        RiskLevel::Medium => vec![RecommendedAction::RequireEmailVerification],
        RiskLevel::Low => vec![RecommendedAction::Proceed],
    }
}
