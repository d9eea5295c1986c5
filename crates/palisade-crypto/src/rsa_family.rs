//! RSA PKCS#1 v1.5 signatures, parameterized by digest.

use crate::authenticator::{
    ensure_key_algorithm, matches_algorithm, missing_signing_key, missing_verification_key,
    Authenticator, Signer, Verifier,
};
use palisade_core::{DigitalSignature, EncodedKey, PalisadeError, Result};
use rsa::pkcs1v15;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer as _, Verifier as _};
use rsa::{RsaPrivateKey, RsaPublicKey};

/// Modulus size of generated keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Digest used before the PKCS#1 v1.5 encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RsaDigest {
    /// SHA-256
    Sha256,
    /// SHA-512
    Sha512,
    /// SHA3-256
    Sha3_256,
    /// SHA3-512
    Sha3_512,
    /// MD5, kept for interoperability with legacy peers
    Md5,
}

impl RsaDigest {
    /// Every supported digest.
    pub const ALL: [RsaDigest; 5] = [
        RsaDigest::Sha256,
        RsaDigest::Sha512,
        RsaDigest::Sha3_256,
        RsaDigest::Sha3_512,
        RsaDigest::Md5,
    ];

    /// Algorithm identifier, e.g. `SHA256withRSA`.
    pub fn identifier(self) -> &'static str {
        match self {
            RsaDigest::Sha256 => "SHA256withRSA",
            RsaDigest::Sha512 => "SHA512withRSA",
            RsaDigest::Sha3_256 => "SHA3-256withRSA",
            RsaDigest::Sha3_512 => "SHA3-512withRSA",
            RsaDigest::Md5 => "MD5withRSA",
        }
    }

    /// Digest named by an algorithm identifier.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|digest| digest.identifier() == identifier)
    }
}

/// Expand `$body` once per digest with `$d` bound to the digest type.
macro_rules! with_digest {
    ($digest:expr, $d:ident => $body:expr) => {
        match $digest {
            RsaDigest::Sha256 => {
                type $d = sha2::Sha256;
                $body
            }
            RsaDigest::Sha512 => {
                type $d = sha2::Sha512;
                $body
            }
            RsaDigest::Sha3_256 => {
                type $d = sha3::Sha3_256;
                $body
            }
            RsaDigest::Sha3_512 => {
                type $d = sha3::Sha3_512;
                $body
            }
            RsaDigest::Md5 => {
                type $d = md5::Md5;
                $body
            }
        }
    };
}

/// RSA authenticator for one digest.
pub struct RsaAuthenticator {
    digest: RsaDigest,
    key_bits: usize,
    private_key: Option<RsaPrivateKey>,
    public_key: Option<RsaPublicKey>,
}

impl RsaAuthenticator {
    /// Authenticator without key material.
    pub fn new(digest: RsaDigest) -> Self {
        Self {
            digest,
            key_bits: DEFAULT_KEY_BITS,
            private_key: None,
            public_key: None,
        }
    }

    /// Use a different modulus size for generated keys.
    pub fn with_key_bits(mut self, key_bits: usize) -> Self {
        self.key_bits = key_bits;
        self
    }

    /// Digest in use.
    pub fn digest(&self) -> RsaDigest {
        self.digest
    }
}

impl Signer for RsaAuthenticator {
    fn algorithm_identifier(&self) -> &str {
        self.digest.identifier()
    }

    fn sign(&self, data: &[u8]) -> Result<DigitalSignature> {
        let algorithm = self.digest.identifier();
        let private_key = self
            .private_key
            .as_ref()
            .ok_or_else(|| missing_signing_key(algorithm))?;
        let bytes = with_digest!(self.digest, D => {
            let signing_key = pkcs1v15::SigningKey::<D>::new(private_key.clone());
            signing_key
                .try_sign(data)
                .map_err(|e| PalisadeError::crypto(format!("{algorithm} signing failed: {e}")))?
                .to_vec()
        });
        Ok(DigitalSignature::new(algorithm, bytes))
    }
}

impl Verifier for RsaAuthenticator {
    fn verify(&self, data: &[u8], signature: &DigitalSignature) -> Result<bool> {
        let algorithm = self.digest.identifier();
        let public_key = self
            .public_key
            .as_ref()
            .ok_or_else(|| missing_verification_key(algorithm))?;
        if !matches_algorithm(algorithm, signature) {
            return Ok(false);
        }
        let Ok(parsed) = pkcs1v15::Signature::try_from(signature.data()) else {
            return Ok(false);
        };
        let valid = with_digest!(self.digest, D => {
            pkcs1v15::VerifyingKey::<D>::new(public_key.clone())
                .verify(data, &parsed)
                .is_ok()
        });
        Ok(valid)
    }
}

impl Authenticator for RsaAuthenticator {
    fn initialize_key_pair(&mut self) -> Result<()> {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), self.key_bits)
            .map_err(|e| PalisadeError::crypto(format!("RSA key generation failed: {e}")))?;
        self.public_key = Some(private_key.to_public_key());
        self.private_key = Some(private_key);
        Ok(())
    }

    /// SubjectPublicKeyInfo DER encoding.
    fn verification_key(&self) -> Result<EncodedKey> {
        let algorithm = self.digest.identifier();
        let public_key = self
            .public_key
            .as_ref()
            .ok_or_else(|| missing_verification_key(algorithm))?;
        let der = public_key
            .to_public_key_der()
            .map_err(|e| PalisadeError::crypto(format!("RSA key encoding failed: {e}")))?;
        Ok(EncodedKey::new(algorithm, der.as_bytes().to_vec()))
    }

    fn set_verification_key(&mut self, key: &EncodedKey) -> Result<()> {
        ensure_key_algorithm(self.digest.identifier(), key)?;
        let public_key = RsaPublicKey::from_public_key_der(key.key())
            .map_err(|e| PalisadeError::crypto(format!("Invalid RSA key: {e}")))?;
        self.public_key = Some(public_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_round_trip() {
        for digest in RsaDigest::ALL {
            assert_eq!(RsaDigest::from_identifier(digest.identifier()), Some(digest));
            assert!(digest.identifier().ends_with("withRSA"));
        }
        assert_eq!(RsaDigest::from_identifier("SHA1withRSA"), None);
    }

    #[test]
    fn test_digest_mismatch_does_not_verify() {
        let mut sha256 = RsaAuthenticator::new(RsaDigest::Sha256).with_key_bits(1024);
        sha256.initialize_key_pair().unwrap();
        let signature = sha256.sign(b"decision").unwrap();

        let mut sha512 = RsaAuthenticator::new(RsaDigest::Sha512);
        let key = EncodedKey::new("SHA512withRSA", sha256.verification_key().unwrap().key().to_vec());
        sha512.set_verification_key(&key).unwrap();
        assert!(!sha512.verify(b"decision", &signature).unwrap());
    }
}
