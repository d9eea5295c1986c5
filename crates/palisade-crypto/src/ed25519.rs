//! Ed25519 signatures with a per-node generated keypair.

use crate::authenticator::{
    ensure_key_algorithm, matches_algorithm, missing_signing_key, missing_verification_key,
    Authenticator, Signer, Verifier,
};
use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use palisade_core::{DigitalSignature, EncodedKey, PalisadeError, Result};
use rand::rngs::OsRng;

/// Algorithm identifier carried on the wire.
pub const ED25519: &str = "Ed25519";

/// Ed25519 authenticator.
#[derive(Default)]
pub struct Ed25519Authenticator {
    signing_key: Option<SigningKey>,
    verifying_key: Option<VerifyingKey>,
}

impl Ed25519Authenticator {
    /// Authenticator without key material.
    pub fn new() -> Self {
        Self::default()
    }

    /// Authenticator using an existing signing key.
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self {
            verifying_key: Some(signing_key.verifying_key()),
            signing_key: Some(signing_key),
        }
    }
}

impl Signer for Ed25519Authenticator {
    fn algorithm_identifier(&self) -> &str {
        ED25519
    }

    fn sign(&self, data: &[u8]) -> Result<DigitalSignature> {
        use ed25519_dalek::Signer as _;

        let signing_key = self
            .signing_key
            .as_ref()
            .ok_or_else(|| missing_signing_key(ED25519))?;
        let signature = signing_key.sign(data);
        Ok(DigitalSignature::new(ED25519, signature.to_bytes().to_vec()))
    }
}

impl Verifier for Ed25519Authenticator {
    fn verify(&self, data: &[u8], signature: &DigitalSignature) -> Result<bool> {
        use ed25519_dalek::Verifier as _;

        let verifying_key = self
            .verifying_key
            .as_ref()
            .ok_or_else(|| missing_verification_key(ED25519))?;
        if !matches_algorithm(ED25519, signature) {
            return Ok(false);
        }
        let Ok(signature) = Signature::from_slice(signature.data()) else {
            return Ok(false);
        };
        Ok(verifying_key.verify(data, &signature).is_ok())
    }
}

impl Authenticator for Ed25519Authenticator {
    fn initialize_key_pair(&mut self) -> Result<()> {
        let signing_key = SigningKey::generate(&mut OsRng);
        self.verifying_key = Some(signing_key.verifying_key());
        self.signing_key = Some(signing_key);
        Ok(())
    }

    fn verification_key(&self) -> Result<EncodedKey> {
        let verifying_key = self
            .verifying_key
            .as_ref()
            .ok_or_else(|| missing_verification_key(ED25519))?;
        Ok(EncodedKey::new(ED25519, verifying_key.to_bytes().to_vec()))
    }

    fn set_verification_key(&mut self, key: &EncodedKey) -> Result<()> {
        ensure_key_algorithm(ED25519, key)?;
        let bytes: [u8; 32] = key.key().try_into().map_err(|_| {
            PalisadeError::crypto(format!(
                "Invalid Ed25519 key length: expected 32 bytes, got {}",
                key.key().len()
            ))
        })?;
        let verifying_key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| PalisadeError::crypto(format!("Invalid Ed25519 key: {e}")))?;
        self.verifying_key = Some(verifying_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_without_key_fails() {
        let authenticator = Ed25519Authenticator::new();
        assert!(authenticator.sign(b"data").is_err());
        let signature = DigitalSignature::new(ED25519, vec![0; 64]);
        assert!(authenticator.verify(b"data", &signature).is_err());
    }

    #[test]
    fn test_malformed_signature_is_rejected() {
        let mut authenticator = Ed25519Authenticator::new();
        authenticator.initialize_key_pair().unwrap();
        let short = DigitalSignature::new(ED25519, vec![1, 2, 3]);
        assert!(!authenticator.verify(b"data", &short).unwrap());
    }

    #[test]
    fn test_key_length_checked() {
        let mut authenticator = Ed25519Authenticator::new();
        let key = EncodedKey::new(ED25519, vec![0; 31]);
        assert!(authenticator.set_verification_key(&key).is_err());
    }

    #[test]
    fn test_from_signing_key() {
        let authenticator = Ed25519Authenticator::from_signing_key(SigningKey::from_bytes(&[7u8; 32]));
        let signature = authenticator.sign(b"payload").unwrap();
        assert!(authenticator.verify(b"payload", &signature).unwrap());
        assert_eq!(signature.data().len(), 64);
    }
}
