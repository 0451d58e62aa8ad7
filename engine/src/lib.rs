//! # Vigil Account Protection & Risk Engine
//!
//! This crate decides, on every authentication-adjacent action, whether a
//! request should proceed, be challenged, or be blocked. It unifies:
//!
//! - **Lockout**: failed-login tracking with timed account locks
//! - **Brute force detection**: per-source-IP burst and sustained patterns
//! - **Device trust**: fingerprint trust scoring with a malicious denylist
//! - **Risk scoring**: location/time/behavior/incident signals folded into
//!   a level that can gate actions behind challenges
//! - **Challenges**: verification lifecycle with pluggable validators
//! - **Sessions**: concurrent-session limits with oldest-first eviction
//! - **Audit aggregation**: rolling metrics and throttled anomaly alerts
//!
//! ## Architecture
//!
//! Components own their state in sharded concurrent maps and share a
//! [`clock::Clock`] and an append-only [`providers::AuditSink`]. External
//! concerns — credential checks, geolocation, notification delivery — sit
//! behind provider traits with in-memory mocks for testing.
//!
//! ```text
//! action ──► LockoutGuard ──► CredentialVerifier
//!               │ fail: LockoutGuard + BruteForceDetector
//!               │ ok:   DeviceTrustStore ─► RiskEngine ─► ChallengeManager
//!               ▼                                 │
//!          SessionRegistry ◄──────────────────────┘ (below gate)
//!
//! all components ──► AuditSink ──► AuditAggregator ──► Notifier
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil_engine::{
//!     clock::SystemClock,
//!     config::ProtectionConfig,
//!     engine::ProtectionEngine,
//!     mocks::{MemoryAuditSink, MockCredentialVerifier, MockGeoLocator, MockNotifier},
//! };
//!
//! # async fn example() {
//! let engine = ProtectionEngine::new(
//!     ProtectionConfig::default(),
//!     MockCredentialVerifier::new().with_user("a@x.com", "secret"),
//!     MockNotifier::new(),
//!     MockGeoLocator::new(),
//!     Arc::new(MemoryAuditSink::new()),
//!     Arc::new(SystemClock),
//! );
//!
//! let outcome = engine
//!     .authenticate("a@x.com", "secret", "203.0.113.7".parse().unwrap(), "ua", None)
//!     .await;
//! # let _ = outcome;
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod audit;
pub mod brute_force;
pub mod challenge;
pub mod clock;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod events;
pub mod lockout;
pub mod mocks;
pub mod providers;
pub mod risk;
pub mod session;
pub mod sweeper;
pub mod window;

// Re-export main types for convenience
pub use config::ProtectionConfig;
pub use engine::{LoginOutcome, ProtectionEngine};
pub use error::{GuardError, Result};
pub use events::{EventKind, EventOutcome, SecurityEvent};
pub use risk::{AssessmentKind, RiskAssessment, RiskLevel};
pub use sweeper::{SweepIntervals, Sweeper};
