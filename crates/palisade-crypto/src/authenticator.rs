//! Signer / verifier abstractions shared by every scheme.
//!
//! Instances are created without key material. A node calls
//! [`Authenticator::initialize_key_pair`] for its own identity; verifiers for
//! remote hosts are built by the factory and receive the peer's key through
//! [`Authenticator::set_verification_key`].

use palisade_core::{DigitalSignature, EncodedKey, PalisadeError, Result};

/// Produces signatures over canonical signing data.
pub trait Signer: Send + Sync {
    /// Stable identifier of the scheme, as carried in signatures and keys.
    fn algorithm_identifier(&self) -> &str;

    /// Sign `data`.
    fn sign(&self, data: &[u8]) -> Result<DigitalSignature>;
}

/// Checks signatures over canonical signing data.
pub trait Verifier: Send + Sync {
    /// Check `signature` over `data`.
    ///
    /// Returns `Ok(false)` for a well-formed request whose signature does not
    /// match, including signatures produced by a different algorithm. Errors
    /// are reserved for missing key material.
    fn verify(&self, data: &[u8], signature: &DigitalSignature) -> Result<bool>;
}

/// A signer and verifier bound to one algorithm.
pub trait Authenticator: Signer + Verifier {
    /// Generate a fresh signing identity and the matching verification key.
    fn initialize_key_pair(&mut self) -> Result<()>;

    /// Verification key in its exchange encoding.
    fn verification_key(&self) -> Result<EncodedKey>;

    /// Adopt an externally supplied verification key.
    fn set_verification_key(&mut self, key: &EncodedKey) -> Result<()>;
}

/// Shared guard: signatures from another scheme never verify.
pub(crate) fn matches_algorithm(expected: &str, signature: &DigitalSignature) -> bool {
    if signature.algorithm() == expected {
        true
    } else {
        tracing::debug!(
            expected,
            actual = signature.algorithm(),
            "signature algorithm mismatch"
        );
        false
    }
}

/// Shared guard: keys for another scheme are rejected.
pub(crate) fn ensure_key_algorithm(expected: &str, key: &EncodedKey) -> Result<()> {
    if key.algorithm() == expected {
        Ok(())
    } else {
        Err(PalisadeError::crypto(format!(
            "key for {} offered to {expected}",
            key.algorithm()
        )))
    }
}

pub(crate) fn missing_signing_key(algorithm: &str) -> PalisadeError {
    PalisadeError::crypto(format!("{algorithm}: signing key not initialized"))
}

pub(crate) fn missing_verification_key(algorithm: &str) -> PalisadeError {
    PalisadeError::crypto(format!("{algorithm}: verification key not set"))
}
