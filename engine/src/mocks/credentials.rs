//! Mock credential verifier for testing.

use crate::providers::CredentialVerifier;
use constant_time_eq::constant_time_eq;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;

/// In-memory credential verifier.
///
/// Holds plaintext credentials; only for tests.
#[derive(Debug, Clone, Default)]
pub struct MockCredentialVerifier {
    credentials: Arc<DashMap<String, String>>,
}

impl MockCredentialVerifier {
    /// Create an empty verifier (rejects everyone).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential.
    #[must_use]
    pub fn with_user(self, identity: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials.insert(identity.into(), password.into());
        self
    }

    /// Replace a credential after construction.
    pub fn set_password(&self, identity: impl Into<String>, password: impl Into<String>) {
        self.credentials.insert(identity.into(), password.into());
    }
}

impl CredentialVerifier for MockCredentialVerifier {
    fn verify(&self, identity: &str, password: &str) -> impl Future<Output = bool> + Send {
        let stored = self.credentials.get(identity).map(|entry| entry.clone());
        let password = password.to_owned();

        async move {
            stored.is_some_and(|expected| {
                constant_time_eq(expected.as_bytes(), password.as_bytes())
            })
        }
    }
}
