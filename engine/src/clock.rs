//! Time source abstraction.
//!
//! Every component that reads the wall clock does so through [`Clock`] so
//! that lock expiry, window arithmetic, and sweep behavior can be tested
//! deterministically. Production code uses [`SystemClock`]; tests use
//! `mocks::FixedClock`.

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
