//! Protection engine facade.
//!
//! Wires the components into the decision flow every sensitive action goes
//! through: lockout gate → credential check → failure bookkeeping or
//! success bookkeeping → risk assessment → challenge gate → session
//! issuance. The engine decides whether the action proceeds; it never
//! issues tokens or renders responses.

use crate::audit::AuditAggregator;
use crate::brute_force::BruteForceDetector;
use crate::challenge::{ChallengeManager, ChallengeVerification};
use crate::clock::Clock;
use crate::config::ProtectionConfig;
use crate::device::{DeviceTrustStore, FingerprintSignals};
use crate::error::{GuardError, Result};
use crate::events::SecurityEvent;
use crate::lockout::LockoutGuard;
use crate::providers::{AuditSink, CredentialVerifier, GeoLocator, Notifier};
use crate::risk::{AssessmentKind, RiskAssessment, RiskEngine, RiskLevel};
use crate::session::{SessionId, SessionRegistry, UserSession};
use std::net::IpAddr;
use std::sync::Arc;

/// Result of a successful authentication decision.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// The session issued for this login.
    pub session: UserSession,

    /// The risk assessment recorded alongside it.
    pub assessment: RiskAssessment,

    /// Whether the presenting device cleared the trust threshold, when
    /// fingerprint signals were supplied.
    pub device_trusted: Option<bool>,
}

/// Account protection engine.
///
/// Generic over the collaborator implementations; the audit sink and clock
/// are shared as trait objects because every component uses them.
pub struct ProtectionEngine<V, N, G>
where
    V: CredentialVerifier,
    N: Notifier,
    G: GeoLocator,
{
    verifier: V,
    lockout: Arc<LockoutGuard>,
    brute_force: Arc<BruteForceDetector>,
    devices: Arc<DeviceTrustStore>,
    sessions: Arc<SessionRegistry>,
    challenges: Arc<ChallengeManager>,
    risk: Arc<RiskEngine<G>>,
    aggregator: Arc<AuditAggregator<N>>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    config: ProtectionConfig,
}

impl<V, N, G> ProtectionEngine<V, N, G>
where
    V: CredentialVerifier,
    N: Notifier,
    G: GeoLocator,
{
    /// Assemble an engine from configuration and collaborators.
    #[must_use]
    pub fn new(
        config: ProtectionConfig,
        verifier: V,
        notifier: N,
        geo: G,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let challenges = Arc::new(ChallengeManager::new(
            config.challenge.clone(),
            Arc::clone(&clock),
            Arc::clone(&audit),
        ));
        Self {
            verifier,
            lockout: Arc::new(LockoutGuard::new(
                config.lockout.clone(),
                Arc::clone(&clock),
                Arc::clone(&audit),
            )),
            brute_force: Arc::new(BruteForceDetector::new(
                config.brute_force.clone(),
                Arc::clone(&clock),
                Arc::clone(&audit),
            )),
            devices: Arc::new(DeviceTrustStore::new(
                config.device.clone(),
                Arc::clone(&clock),
                Arc::clone(&audit),
            )),
            sessions: Arc::new(SessionRegistry::new(
                config.session.clone(),
                Arc::clone(&clock),
                Arc::clone(&audit),
            )),
            risk: Arc::new(RiskEngine::new(
                config.risk.clone(),
                geo,
                Arc::clone(&challenges),
                Arc::clone(&clock),
                Arc::clone(&audit),
            )),
            aggregator: Arc::new(AuditAggregator::new(
                config.audit.clone(),
                Arc::clone(&audit),
                notifier,
                Arc::clone(&clock),
            )),
            challenges,
            audit,
            clock,
            config,
        }
    }

    /// Decide a login attempt.
    ///
    /// # Errors
    ///
    /// - [`GuardError::AccountLocked`] while a lockout holds (checked
    ///   before the credential, so a locked account leaks nothing about
    ///   the password).
    /// - [`GuardError::RateExceeded`] while the source address matches an
    ///   active attack pattern.
    /// - [`GuardError::InvalidCredentials`] on a failed check, after the
    ///   failure is counted against the identity and the source address.
    /// - [`GuardError::ChallengeRequired`] when the risk level gates the
    ///   login behind a pending challenge.
    pub async fn authenticate(
        &self,
        identity: &str,
        password: &str,
        ip: IpAddr,
        user_agent: &str,
        signals: Option<&FingerprintSignals>,
    ) -> Result<LoginOutcome> {
        if let Some(remaining) = self.lockout.remaining_lockout(identity) {
            return Err(GuardError::AccountLocked {
                retry_after: remaining.to_std().unwrap_or_default(),
            });
        }

        if self.brute_force.is_suspected_attacker(ip) {
            return Err(GuardError::RateExceeded {
                retry_after: self
                    .config
                    .brute_force
                    .sustained_window
                    .to_std()
                    .unwrap_or_default(),
            });
        }

        if !self.verifier.verify(identity, password).await {
            self.lockout.record_failure(identity);
            self.brute_force.record(ip, user_agent);
            self.audit.append(SecurityEvent::LoginFailed {
                identity: identity.to_owned(),
                ip_address: ip,
                occurred_at: self.clock.now(),
            });

            // A flagged source burns the reputation of whatever device
            // fingerprint it presents.
            if let Some(signals) = signals {
                if self.brute_force.is_suspected_attacker(ip) {
                    let hash = signals.fingerprint();
                    if !self.devices.is_malicious(&hash) {
                        self.devices
                            .mark_suspicious(&hash, "presented by flagged source address");
                    }
                }
            }
            return Err(GuardError::InvalidCredentials);
        }

        self.lockout.record_success(identity);

        let device_trusted = signals.map(|signals| {
            let hash = signals.fingerprint();
            self.devices.record(identity, &hash, ip);
            self.devices.is_trusted(identity, &hash)
        });

        let assessment = self
            .risk
            .assess(identity, ip, user_agent, AssessmentKind::Login)
            .await;

        if assessment.level >= RiskLevel::High {
            // The risk engine already ensured a pending challenge exists.
            if let Some(challenge) = self.challenges.active_challenge(identity) {
                return Err(GuardError::ChallengeRequired {
                    challenge_id: challenge.id,
                    challenge_type: challenge.challenge_type,
                });
            }
        }

        let session = self.sessions.create(identity, ip, user_agent);
        self.audit.append(SecurityEvent::LoginSucceeded {
            identity: identity.to_owned(),
            ip_address: ip,
            occurred_at: self.clock.now(),
        });

        Ok(LoginOutcome {
            session,
            assessment,
            device_trusted,
        })
    }

    /// Assess a non-login sensitive action (payment, admin, profile change).
    ///
    /// # Errors
    ///
    /// - [`GuardError::AccountLocked`] while a lockout holds.
    /// - [`GuardError::ChallengeRequired`] when the assessment gates the
    ///   action.
    pub async fn authorize_action(
        &self,
        identity: &str,
        ip: IpAddr,
        user_agent: &str,
        kind: AssessmentKind,
    ) -> Result<RiskAssessment> {
        if let Some(remaining) = self.lockout.remaining_lockout(identity) {
            return Err(GuardError::AccountLocked {
                retry_after: remaining.to_std().unwrap_or_default(),
            });
        }

        let assessment = self.risk.assess(identity, ip, user_agent, kind).await;
        if assessment.level >= RiskLevel::High {
            if let Some(challenge) = self.challenges.active_challenge(identity) {
                return Err(GuardError::ChallengeRequired {
                    challenge_id: challenge.id,
                    challenge_type: challenge.challenge_type,
                });
            }
        }
        Ok(assessment)
    }

    /// Verify a challenge response.
    ///
    /// # Errors
    ///
    /// - [`GuardError::ChallengeExpired`] when the challenge is past its
    ///   expiry.
    /// - [`GuardError::ChallengeInvalid`] for unknown tokens, replays, and
    ///   wrong responses — deliberately indistinguishable to the caller.
    pub fn verify_challenge(&self, token: &str, response: &str, ip: IpAddr) -> Result<()> {
        match self.challenges.verify_detailed(token, response, ip) {
            ChallengeVerification::Completed => Ok(()),
            ChallengeVerification::Expired => Err(GuardError::ChallengeExpired),
            ChallengeVerification::Unknown
            | ChallengeVerification::AlreadyCompleted
            | ChallengeVerification::Rejected => Err(GuardError::ChallengeInvalid),
        }
    }

    /// Validate a session presented from `ip`.
    pub fn validate_session(&self, session_id: SessionId, ip: IpAddr) -> bool {
        self.sessions.validate(session_id, ip)
    }

    /// Revoke a session.
    pub fn terminate_session(&self, session_id: SessionId, reason: &str) -> bool {
        self.sessions.terminate(session_id, reason)
    }

    /// Administrative unlock.
    pub fn unlock(&self, identity: &str, actor: &str) {
        self.lockout.unlock(identity, actor);
    }

    /// Lockout component.
    #[must_use]
    pub fn lockout(&self) -> &LockoutGuard {
        &self.lockout
    }

    /// Brute force component.
    #[must_use]
    pub fn brute_force(&self) -> &BruteForceDetector {
        &self.brute_force
    }

    /// Device trust component.
    #[must_use]
    pub fn devices(&self) -> &DeviceTrustStore {
        &self.devices
    }

    /// Session component.
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Challenge component.
    #[must_use]
    pub fn challenges(&self) -> &ChallengeManager {
        &self.challenges
    }

    /// Risk component.
    #[must_use]
    pub fn risk(&self) -> &RiskEngine<G> {
        &self.risk
    }

    /// Aggregator component.
    #[must_use]
    pub fn aggregator(&self) -> &AuditAggregator<N> {
        &self.aggregator
    }

    /// Shared handles for the background sweeper.
    #[must_use]
    pub(crate) fn sweep_targets(&self) -> SweepTargets<N, G> {
        SweepTargets {
            lockout: Arc::clone(&self.lockout),
            brute_force: Arc::clone(&self.brute_force),
            challenges: Arc::clone(&self.challenges),
            sessions: Arc::clone(&self.sessions),
            risk: Arc::clone(&self.risk),
            aggregator: Arc::clone(&self.aggregator),
        }
    }
}

/// Component handles the sweeper drives.
pub(crate) struct SweepTargets<N: Notifier, G: GeoLocator> {
    pub(crate) lockout: Arc<LockoutGuard>,
    pub(crate) brute_force: Arc<BruteForceDetector>,
    pub(crate) challenges: Arc<ChallengeManager>,
    pub(crate) sessions: Arc<SessionRegistry>,
    pub(crate) risk: Arc<RiskEngine<G>>,
    pub(crate) aggregator: Arc<AuditAggregator<N>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskConfig;
    use crate::mocks::{FixedClock, MemoryAuditSink, MockCredentialVerifier, MockGeoLocator, MockNotifier};
    use chrono::{DateTime, Duration, Utc};
    use std::net::Ipv4Addr;

    type TestEngine = ProtectionEngine<MockCredentialVerifier, MockNotifier, MockGeoLocator>;

    fn engine_with(config: ProtectionConfig) -> (Arc<FixedClock>, TestEngine) {
        let clock = Arc::new(FixedClock::default());
        let engine = ProtectionEngine::new(
            config,
            MockCredentialVerifier::new().with_user("a@x.com", "correct horse"),
            MockNotifier::new(),
            MockGeoLocator::new(),
            Arc::new(MemoryAuditSink::new()) as Arc<dyn AuditSink>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (clock, engine)
    }

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, 50))
    }

    #[tokio::test]
    async fn good_credentials_yield_a_session() {
        let (_clock, engine) = engine_with(ProtectionConfig::default());
        let outcome = engine
            .authenticate("a@x.com", "correct horse", ip(), "ua", None)
            .await
            .unwrap();
        assert!(outcome.session.active);
        assert_eq!(outcome.assessment.level, RiskLevel::Low);
        assert_eq!(outcome.device_trusted, None);
    }

    #[tokio::test]
    async fn bad_credentials_are_counted() {
        let (_clock, engine) = engine_with(ProtectionConfig::default());
        let err = engine
            .authenticate("a@x.com", "wrong", ip(), "ua", None)
            .await
            .unwrap_err();
        assert_eq!(err, GuardError::InvalidCredentials);
        assert_eq!(
            engine.lockout().record("a@x.com").map(|r| r.failed_attempts),
            Some(1)
        );
        assert_eq!(engine.brute_force().attempt_count(ip()), 1);
    }

    #[tokio::test]
    async fn high_risk_login_is_gated_behind_a_challenge() {
        let config = ProtectionConfig::default()
            .with_risk(RiskConfig::default().with_thresholds(5.0, 10.0, 95.0));
        let (clock, engine) = engine_with(config);
        // Put the identity at an odd hour so the login itself carries risk.
        clock.set(DateTime::<Utc>::UNIX_EPOCH + Duration::hours(3));

        let err = engine
            .authenticate("a@x.com", "correct horse", ip(), "ua", None)
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::ChallengeRequired { .. }));
        // No session was issued for the gated login.
        assert!(engine.sessions().active_sessions("a@x.com").is_empty());
    }
}
