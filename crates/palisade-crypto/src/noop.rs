//! Constant "signature" for throughput benchmarks.
//!
//! Provides no authenticity at all. Only select it when measuring the cost of
//! the other schemes.

use crate::authenticator::{ensure_key_algorithm, matches_algorithm, Authenticator, Signer, Verifier};
use palisade_core::{DigitalSignature, EncodedKey, Result};

/// Algorithm identifier carried on the wire.
pub const NO_OPERATION: &str = "NoOperation";

const SIGNATURE: [u8; 2] = [0x00, 0x01];

/// Benchmark-only authenticator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOperationAuthenticator;

impl NoOperationAuthenticator {
    /// Create the authenticator.
    pub fn new() -> Self {
        Self
    }
}

impl Signer for NoOperationAuthenticator {
    fn algorithm_identifier(&self) -> &str {
        NO_OPERATION
    }

    fn sign(&self, _data: &[u8]) -> Result<DigitalSignature> {
        Ok(DigitalSignature::new(NO_OPERATION, SIGNATURE.to_vec()))
    }
}

impl Verifier for NoOperationAuthenticator {
    fn verify(&self, _data: &[u8], signature: &DigitalSignature) -> Result<bool> {
        Ok(matches_algorithm(NO_OPERATION, signature) && signature.data() == SIGNATURE)
    }
}

impl Authenticator for NoOperationAuthenticator {
    fn initialize_key_pair(&mut self) -> Result<()> {
        tracing::warn!("NoOperation authenticator in use; messages are not authenticated");
        Ok(())
    }

    fn verification_key(&self) -> Result<EncodedKey> {
        Ok(EncodedKey::new(NO_OPERATION, Vec::new()))
    }

    fn set_verification_key(&mut self, key: &EncodedKey) -> Result<()> {
        ensure_key_algorithm(NO_OPERATION, key)
    }
}
