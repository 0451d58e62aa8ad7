//! End-to-end protection flow tests.
//!
//! These drive the assembled engine the way an authentication layer would:
//! repeated failures locking an account, device reputation following a
//! denylisted fingerprint across identities, and risk gating a login
//! behind a challenge.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use vigil_engine::clock::Clock;
use vigil_engine::config::{ProtectionConfig, RiskConfig, SessionConfig};
use vigil_engine::device::FingerprintSignals;
use vigil_engine::engine::ProtectionEngine;
use vigil_engine::mocks::{
    FixedClock, MemoryAuditSink, MockCredentialVerifier, MockGeoLocator, MockNotifier,
};
use vigil_engine::providers::AuditSink;
use vigil_engine::risk::AssessmentKind;
use vigil_engine::{EventKind, GuardError, RiskLevel};

type TestEngine = ProtectionEngine<MockCredentialVerifier, MockNotifier, MockGeoLocator>;

struct Harness {
    clock: Arc<FixedClock>,
    sink: Arc<MemoryAuditSink>,
    engine: TestEngine,
}

fn harness_with(config: ProtectionConfig) -> Harness {
    let clock = Arc::new(FixedClock::default());
    let sink = Arc::new(MemoryAuditSink::new());
    let engine = ProtectionEngine::new(
        config,
        MockCredentialVerifier::new()
            .with_user("a@x.com", "correct horse")
            .with_user("b@x.com", "battery staple"),
        MockNotifier::new(),
        MockGeoLocator::new(),
        Arc::clone(&sink) as Arc<dyn AuditSink>,
        Arc::clone(&clock) as Arc<dyn Clock>,
    );
    Harness {
        clock,
        sink,
        engine,
    }
}

fn harness() -> Harness {
    harness_with(ProtectionConfig::default())
}

fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(203, 0, 113, last))
}

fn signals(ua: &str) -> FingerprintSignals {
    FingerprintSignals {
        user_agent: ua.to_owned(),
        accept_language: "en-US,en;q=0.9".to_owned(),
        accept_encoding: "gzip, deflate, br".to_owned(),
        accept: "text/html".to_owned(),
        client_hints: vec![],
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Scenario A: repeated failures lock the account
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn five_failures_lock_out_even_the_correct_password() {
    let h = harness();

    for _ in 0..5 {
        let err = h
            .engine
            .authenticate("a@x.com", "wrong", ip(1), "ua", None)
            .await
            .unwrap_err();
        assert_eq!(err, GuardError::InvalidCredentials);
    }

    // The sixth attempt carries the right password and is still refused.
    let err = h
        .engine
        .authenticate("a@x.com", "correct horse", ip(1), "ua", None)
        .await
        .unwrap_err();
    let GuardError::AccountLocked { retry_after } = err else {
        panic!("expected AccountLocked, got {err:?}");
    };
    assert!(retry_after <= std::time::Duration::from_secs(30 * 60));
    assert_eq!(h.sink.count_kind(EventKind::LockoutTriggered), 1);

    // After the lock expires the same credentials work.
    h.clock.advance(Duration::minutes(31));
    let outcome = h
        .engine
        .authenticate("a@x.com", "correct horse", ip(1), "ua", None)
        .await
        .unwrap();
    assert!(outcome.session.active);
}

#[tokio::test]
async fn four_failures_do_not_lock() {
    let h = harness();
    for _ in 0..4 {
        let _ = h
            .engine
            .authenticate("a@x.com", "wrong", ip(1), "ua", None)
            .await;
    }
    assert!(!h.engine.lockout().is_locked("a@x.com"));

    let outcome = h
        .engine
        .authenticate("a@x.com", "correct horse", ip(1), "ua", None)
        .await
        .unwrap();
    assert!(outcome.session.active);
    // Success reset the counter.
    assert!(h.engine.lockout().record("a@x.com").is_none()
        || h.engine.lockout().record("a@x.com").map(|r| r.failed_attempts) == Some(0));
}

#[tokio::test]
async fn admin_unlock_restores_access_immediately() {
    let h = harness();
    for _ in 0..5 {
        let _ = h
            .engine
            .authenticate("a@x.com", "wrong", ip(1), "ua", None)
            .await;
    }
    assert!(h.engine.lockout().is_locked("a@x.com"));

    h.engine.unlock("a@x.com", "ops@x.com");
    let outcome = h
        .engine
        .authenticate("a@x.com", "correct horse", ip(1), "ua", None)
        .await
        .unwrap();
    assert!(outcome.session.active);
    assert_eq!(h.sink.count_kind(EventKind::ManualUnlock), 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Scenario B: a denylisted fingerprint loses trust everywhere
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn suspicious_fingerprint_is_untrusted_for_every_identity() {
    let h = harness();
    let shared = signals("Mozilla/5.0 shared device");
    let hash = shared.fingerprint();

    // Both identities earn trust on the same device over many logins.
    for _ in 0..30 {
        h.engine
            .authenticate("a@x.com", "correct horse", ip(1), "ua", Some(&shared))
            .await
            .unwrap();
        h.engine
            .authenticate("b@x.com", "battery staple", ip(2), "ua", Some(&shared))
            .await
            .unwrap();
        h.clock.advance(Duration::minutes(10));
    }
    assert!(h.engine.devices().is_trusted("a@x.com", &hash));
    assert!(h.engine.devices().is_trusted("b@x.com", &hash));

    h.engine
        .devices()
        .mark_suspicious(&hash, "reported stolen device");

    assert!(!h.engine.devices().is_trusted("a@x.com", &hash));
    assert!(!h.engine.devices().is_trusted("b@x.com", &hash));

    // Further logins still succeed, but the device no longer records or
    // counts as trusted.
    let outcome = h
        .engine
        .authenticate("a@x.com", "correct horse", ip(1), "ua", Some(&shared))
        .await
        .unwrap();
    assert_eq!(outcome.device_trusted, Some(false));
    assert!(h.sink.count_kind(EventKind::FingerprintRejected) >= 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Scenario C: type baseline alone stays low-risk
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn payment_with_no_other_signals_scores_the_baseline() {
    let h = harness();
    let assessment = h
        .engine
        .authorize_action("a@x.com", ip(1), "ua", AssessmentKind::PaymentTransaction)
        .await
        .unwrap();
    assert!((assessment.score - 25.0).abs() < 1e-9);
    assert_eq!(assessment.level, RiskLevel::Low);
}

// ═══════════════════════════════════════════════════════════════════════
// Brute force boundary
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn eleven_failed_attempts_from_one_address_flag_it() {
    let h = harness();
    // Credential stuffing: distinct identities, one source address.
    for i in 0..11 {
        let _ = h
            .engine
            .authenticate(&format!("victim{i}@x.com"), "guess", ip(9), "ua", None)
            .await;
        h.clock.advance(Duration::seconds(2));
    }
    assert!(h.engine.brute_force().is_suspected_attacker(ip(9)));
    assert_eq!(h.sink.count_kind(EventKind::BruteForceBurst), 1);
}

#[tokio::test]
async fn nine_failed_attempts_stay_unflagged() {
    let h = harness();
    for i in 0..9 {
        let _ = h
            .engine
            .authenticate(&format!("victim{i}@x.com"), "guess", ip(9), "ua", None)
            .await;
        h.clock.advance(Duration::seconds(2));
    }
    assert!(!h.engine.brute_force().is_suspected_attacker(ip(9)));
}

#[tokio::test]
async fn flagged_source_is_rate_limited_even_with_good_credentials() {
    let h = harness();
    for i in 0..11 {
        let _ = h
            .engine
            .authenticate(&format!("victim{i}@x.com"), "guess", ip(9), "ua", None)
            .await;
    }
    assert!(h.engine.brute_force().is_suspected_attacker(ip(9)));

    let err = h
        .engine
        .authenticate("a@x.com", "correct horse", ip(9), "ua", None)
        .await
        .unwrap_err();
    assert!(matches!(err, GuardError::RateExceeded { .. }));

    // A clean address is unaffected.
    h.engine
        .authenticate("a@x.com", "correct horse", ip(8), "ua", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn flagged_source_burns_its_fingerprint() {
    let h = harness();
    let attacker = signals("HeadlessChrome/120");
    let hash = attacker.fingerprint();

    for i in 0..12 {
        let _ = h
            .engine
            .authenticate(
                &format!("victim{i}@x.com"),
                "guess",
                ip(9),
                "ua",
                Some(&attacker),
            )
            .await;
    }
    assert!(h.engine.devices().is_malicious(&hash));
    assert_eq!(h.sink.count_kind(EventKind::FingerprintMarkedSuspicious), 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Challenge gate
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn risky_login_is_gated_and_the_challenge_is_stable() {
    // Lower the gate so an odd-hour login is already High.
    let config = ProtectionConfig::default()
        .with_risk(RiskConfig::default().with_thresholds(5.0, 15.0, 95.0));
    let h = harness_with(config);
    h.clock
        .set(DateTime::<Utc>::UNIX_EPOCH + Duration::hours(2));

    let first = h
        .engine
        .authenticate("a@x.com", "correct horse", ip(1), "ua", None)
        .await
        .unwrap_err();
    let GuardError::ChallengeRequired { challenge_id, .. } = first else {
        panic!("expected ChallengeRequired, got {first:?}");
    };

    // Retrying returns the same pending challenge, not a new one.
    let second = h
        .engine
        .authenticate("a@x.com", "correct horse", ip(1), "ua", None)
        .await
        .unwrap_err();
    let GuardError::ChallengeRequired {
        challenge_id: second_id,
        ..
    } = second
    else {
        panic!("expected ChallengeRequired, got {second:?}");
    };
    assert_eq!(challenge_id, second_id);
    assert_eq!(h.sink.count_kind(EventKind::ChallengeCreated), 1);
}

#[tokio::test]
async fn completed_challenge_token_cannot_be_replayed() {
    let h = harness();
    let challenge = h.engine.challenges().create(
        "a@x.com",
        vigil_engine::challenge::ChallengeType::EmailVerification,
        ip(1),
        "ua",
    );
    let token = challenge.verification_token.clone();

    assert!(h.engine.verify_challenge(&token, &token, ip(1)).is_ok());
    assert_eq!(
        h.engine.verify_challenge(&token, &token, ip(1)),
        Err(GuardError::ChallengeInvalid)
    );
    assert_eq!(h.sink.count_kind(EventKind::ChallengeReuseAttempt), 1);
}

#[tokio::test]
async fn expired_challenge_reports_expiry_to_the_caller() {
    let h = harness();
    let challenge = h.engine.challenges().create(
        "a@x.com",
        vigil_engine::challenge::ChallengeType::EmailVerification,
        ip(1),
        "ua",
    );
    let token = challenge.verification_token.clone();

    h.clock.advance(Duration::minutes(31));
    assert_eq!(
        h.engine.verify_challenge(&token, &token, ip(1)),
        Err(GuardError::ChallengeExpired)
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn concurrent_logins_evict_the_oldest_session() {
    let config = ProtectionConfig::default()
        .with_session(SessionConfig::default().with_max_concurrent_sessions(3));
    let h = harness_with(config);

    let mut sessions = Vec::new();
    for _ in 0..4 {
        let outcome = h
            .engine
            .authenticate("a@x.com", "correct horse", ip(1), "ua", None)
            .await
            .unwrap();
        sessions.push(outcome.session);
        h.clock.advance(Duration::seconds(5));
    }

    let active = h.engine.sessions().active_sessions("a@x.com");
    assert_eq!(active.len(), 3);
    assert!(
        !active
            .iter()
            .any(|s| s.session_id == sessions[0].session_id),
        "the oldest session must be the one evicted"
    );
    assert_eq!(h.sink.count_kind(EventKind::SessionEvicted), 1);
}

#[tokio::test]
async fn session_from_the_wrong_address_is_revoked() {
    let h = harness();
    let outcome = h
        .engine
        .authenticate("a@x.com", "correct horse", ip(1), "ua", None)
        .await
        .unwrap();

    assert!(h.engine.validate_session(outcome.session.session_id, ip(1)));
    assert!(!h.engine.validate_session(outcome.session.session_id, ip(2)));
    // The hijack attempt killed the session for the real address too.
    assert!(!h.engine.validate_session(outcome.session.session_id, ip(1)));
    assert_eq!(h.sink.count_kind(EventKind::SessionIpMismatch), 1);
}
