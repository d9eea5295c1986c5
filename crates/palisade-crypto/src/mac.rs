//! HMAC-SHA-512/256 with a symmetric key.
//!
//! The same key signs and verifies. A node generates its own key, so two
//! nodes only interoperate when the key is provisioned out of band through
//! [`Authenticator::set_verification_key`]; the key is never exported over
//! the key-exchange protocol.

use crate::authenticator::{
    ensure_key_algorithm, matches_algorithm, missing_signing_key, missing_verification_key,
    Authenticator, Signer, Verifier,
};
use hmac::{Hmac, Mac};
use palisade_core::{DigitalSignature, EncodedKey, PalisadeError, Result};
use rand::RngCore;
use sha2::Sha512_256;
use zeroize::Zeroizing;

/// Algorithm identifier carried on the wire.
pub const HMAC_SHA512_256: &str = "HmacSHA512/256";

/// Length of generated keys in bytes.
pub const KEY_LEN: usize = 128;

type HmacSha512_256 = Hmac<Sha512_256>;

/// HMAC authenticator.
#[derive(Default)]
pub struct HmacAuthenticator {
    key: Option<Zeroizing<Vec<u8>>>,
}

impl HmacAuthenticator {
    /// Authenticator without key material.
    pub fn new() -> Self {
        Self::default()
    }

    /// Authenticator using a pre-shared key.
    pub fn with_shared_key(key: Vec<u8>) -> Self {
        Self {
            key: Some(Zeroizing::new(key)),
        }
    }

    fn mac(&self, missing: fn(&str) -> PalisadeError) -> Result<HmacSha512_256> {
        let key = self.key.as_ref().ok_or_else(|| missing(HMAC_SHA512_256))?;
        HmacSha512_256::new_from_slice(key)
            .map_err(|e| PalisadeError::crypto(format!("Invalid HMAC key: {e}")))
    }
}

impl Signer for HmacAuthenticator {
    fn algorithm_identifier(&self) -> &str {
        HMAC_SHA512_256
    }

    fn sign(&self, data: &[u8]) -> Result<DigitalSignature> {
        let mut mac = self.mac(missing_signing_key)?;
        mac.update(data);
        Ok(DigitalSignature::new(
            HMAC_SHA512_256,
            mac.finalize().into_bytes().to_vec(),
        ))
    }
}

impl Verifier for HmacAuthenticator {
    fn verify(&self, data: &[u8], signature: &DigitalSignature) -> Result<bool> {
        let mut mac = self.mac(missing_verification_key)?;
        if !matches_algorithm(HMAC_SHA512_256, signature) {
            return Ok(false);
        }
        mac.update(data);
        Ok(mac.verify_slice(signature.data()).is_ok())
    }
}

impl Authenticator for HmacAuthenticator {
    fn initialize_key_pair(&mut self) -> Result<()> {
        let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
        rand::thread_rng().fill_bytes(&mut key);
        self.key = Some(key);
        Ok(())
    }

    fn verification_key(&self) -> Result<EncodedKey> {
        Err(PalisadeError::crypto(
            "HMAC keys are symmetric and are never exported",
        ))
    }

    fn set_verification_key(&mut self, key: &EncodedKey) -> Result<()> {
        ensure_key_algorithm(HMAC_SHA512_256, key)?;
        if key.key().is_empty() {
            return Err(PalisadeError::crypto("empty HMAC key"));
        }
        self.key = Some(Zeroizing::new(key.key().to_vec()));
        Ok(())
    }
}
