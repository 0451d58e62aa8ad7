//! Error types for account protection decisions.

use crate::challenge::{ChallengeId, ChallengeType};
use thiserror::Error;

/// Result type alias for protection operations.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Error taxonomy for the protection engine.
///
/// Only coarse outcomes are user-visible: locked, challenged, rate limited,
/// or rejected. No variant carries scoring internals, thresholds, or any
/// information about other identities.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    // ═══════════════════════════════════════════════════════════
    // Authentication Outcomes
    // ═══════════════════════════════════════════════════════════
    /// Invalid credentials provided.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The identity is temporarily locked out after repeated failures.
    #[error("Account temporarily locked, retry after {retry_after:?}")]
    AccountLocked {
        /// Duration to wait before the lock expires.
        retry_after: std::time::Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // Challenge Outcomes
    // ═══════════════════════════════════════════════════════════
    /// The action is gated behind a verification challenge.
    ///
    /// The caller routes the user to the verification flow identified by
    /// `challenge_id` / `challenge_type`.
    #[error("Additional verification required")]
    ChallengeRequired {
        /// Identifier of the pending challenge.
        challenge_id: ChallengeId,
        /// Kind of verification the caller must route to.
        challenge_type: ChallengeType,
    },

    /// The presented challenge is past its expiry.
    #[error("Verification challenge has expired")]
    ChallengeExpired,

    /// The challenge response did not verify.
    #[error("Verification failed")]
    ChallengeInvalid,

    // ═══════════════════════════════════════════════════════════
    // Rate Limiting
    // ═══════════════════════════════════════════════════════════
    /// Too many attempts from this source.
    #[error("Too many attempts, please retry after {retry_after:?}")]
    RateExceeded {
        /// Duration to wait before retrying.
        retry_after: std::time::Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════
    /// Internal failure (never exposed to end users verbatim).
    #[error("Internal error")]
    Internal(String),
}

impl GuardError {
    /// Returns `true` if this error is safe to surface to the end user.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::AccountLocked { .. }
                | Self::ChallengeRequired { .. }
                | Self::ChallengeExpired
                | Self::ChallengeInvalid
                | Self::RateExceeded { .. }
        )
    }

    /// Returns `true` if this error indicates hostile activity worth flagging.
    #[must_use]
    pub const fn is_security_issue(&self) -> bool {
        matches!(
            self,
            Self::AccountLocked { .. } | Self::RateExceeded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_are_classified() {
        assert!(GuardError::InvalidCredentials.is_user_error());
        assert!(
            GuardError::AccountLocked {
                retry_after: std::time::Duration::from_secs(60)
            }
            .is_user_error()
        );
        assert!(!GuardError::Internal("lock poisoned".into()).is_user_error());
    }

    #[test]
    fn lockout_is_a_security_issue() {
        assert!(
            GuardError::AccountLocked {
                retry_after: std::time::Duration::from_secs(60)
            }
            .is_security_issue()
        );
        assert!(!GuardError::InvalidCredentials.is_security_issue());
    }

    #[test]
    fn display_leaks_no_internals() {
        let err = GuardError::ChallengeRequired {
            challenge_id: ChallengeId::new(),
            challenge_type: ChallengeType::RiskBased,
        };
        let rendered = err.to_string();
        assert!(!rendered.contains("risk"));
        assert!(!rendered.to_lowercase().contains("score"));
    }
}
