//! Credential verification trait.

use std::future::Future;

/// Credential verifier.
///
/// Password hashing and comparison live outside this engine; the engine only
/// needs a yes/no answer. Implementations must be constant-time with respect
/// to the stored credential (argon2/bcrypt verification already is).
pub trait CredentialVerifier: Send + Sync {
    /// Check a plaintext credential for an identity.
    ///
    /// Returns `false` for unknown identities as well as wrong credentials;
    /// the engine never learns which, and neither should the caller.
    fn verify(&self, identity: &str, password: &str) -> impl Future<Output = bool> + Send;
}
