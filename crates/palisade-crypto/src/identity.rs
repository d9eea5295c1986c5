//! Pairing-based identity signatures over BLS12-381.
//!
//! A key generation centre derives a partial private key `ppk = s·H1(id)` for
//! each node identity; the node adds its own secret `x`. With `H(m)` hashed to
//! G1 and `g2` the G2 generator:
//!
//! ```text
//! sign:    σ = ppk + x·H(m)
//! verify:  e(σ, g2) == e(ppk, g2) · e(H(m), x·g2)
//! ```
//!
//! The published key is the pair `(ppk, x·g2)`, standing in for the
//! aggregated key the key generation centre would distribute. Until that
//! centre exists, the master secret `s` is derived from a fixed seed.

use crate::authenticator::{
    ensure_key_algorithm, matches_algorithm, missing_signing_key, missing_verification_key,
    Authenticator, Signer, Verifier,
};
use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use palisade_core::{DigitalSignature, EncodedKey, PalisadeError, Result};
use rand::RngCore;
use sha2::{Digest, Sha512};
use sha2_xmd::Sha256 as XmdSha256;

/// Algorithm identifier carried on the wire.
pub const S_CASA: &str = "S_CASA";

const IDENTITY_DST: &[u8] = b"PALISADE-CASA-V01-CS01-with-BLS12381G1_XMD:SHA-256_SSWU_RO_ID_";
const MESSAGE_DST: &[u8] = b"PALISADE-CASA-V01-CS01-with-BLS12381G1_XMD:SHA-256_SSWU_RO_MSG_";
const MASTER_SEED: &[u8] = b"PALISADE-CASA-MASTER-S";

const G1_LEN: usize = 48;
const G2_LEN: usize = 96;

/// Length of generated identities in bytes.
pub const IDENTITY_LEN: usize = 128;

struct SecretKey {
    ppk: G1Projective,
    x: Scalar,
}

#[derive(Clone, Copy)]
struct PublicKey {
    ppk: G1Affine,
    x_g2: G2Affine,
}

impl PublicKey {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(G1_LEN + G2_LEN);
        out.extend_from_slice(&self.ppk.to_compressed());
        out.extend_from_slice(&self.x_g2.to_compressed());
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != G1_LEN + G2_LEN {
            return Err(PalisadeError::crypto(format!(
                "Invalid S_CASA key length: expected {} bytes, got {}",
                G1_LEN + G2_LEN,
                bytes.len()
            )));
        }
        let ppk = decode_g1(&bytes[..G1_LEN])
            .ok_or_else(|| PalisadeError::crypto("Invalid S_CASA partial key"))?;
        let mut x_g2 = [0u8; G2_LEN];
        x_g2.copy_from_slice(&bytes[G1_LEN..]);
        let x_g2 = Option::<G2Affine>::from(G2Affine::from_compressed(&x_g2))
            .ok_or_else(|| PalisadeError::crypto("Invalid S_CASA public key"))?;
        Ok(Self { ppk, x_g2 })
    }
}

fn decode_g1(bytes: &[u8]) -> Option<G1Affine> {
    let compressed: [u8; G1_LEN] = bytes.try_into().ok()?;
    Option::from(G1Affine::from_compressed(&compressed))
}

fn hash_to_g1(data: &[u8], dst: &[u8]) -> G1Projective {
    <G1Projective as HashToCurve<ExpandMsgXmd<XmdSha256>>>::hash_to_curve(data, dst)
}

fn scalar_from_wide(seed: &[u8]) -> Scalar {
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&Sha512::digest(seed));
    Scalar::from_bytes_wide(&wide)
}

/// Identity-based authenticator.
pub struct CasaAuthenticator {
    identity: Vec<u8>,
    signing_key: Option<SecretKey>,
    verification_key: Option<PublicKey>,
}

impl CasaAuthenticator {
    /// Authenticator with a random identity.
    pub fn new() -> Self {
        let mut identity = vec![0u8; IDENTITY_LEN];
        rand::thread_rng().fill_bytes(&mut identity);
        Self::with_identity(identity)
    }

    /// Authenticator bound to `identity`.
    pub fn with_identity(identity: Vec<u8>) -> Self {
        Self {
            identity,
            signing_key: None,
            verification_key: None,
        }
    }

    /// Identity the partial private key is derived from.
    pub fn identity(&self) -> &[u8] {
        &self.identity
    }

    /// Partial private key issued by the key generation centre.
    fn partial_private_key(&self) -> G1Projective {
        hash_to_g1(&self.identity, IDENTITY_DST) * scalar_from_wide(MASTER_SEED)
    }
}

impl Default for CasaAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl Signer for CasaAuthenticator {
    fn algorithm_identifier(&self) -> &str {
        S_CASA
    }

    fn sign(&self, data: &[u8]) -> Result<DigitalSignature> {
        let key = self
            .signing_key
            .as_ref()
            .ok_or_else(|| missing_signing_key(S_CASA))?;
        let sigma = key.ppk + hash_to_g1(data, MESSAGE_DST) * key.x;
        Ok(DigitalSignature::new(
            S_CASA,
            G1Affine::from(sigma).to_compressed().to_vec(),
        ))
    }
}

impl Verifier for CasaAuthenticator {
    fn verify(&self, data: &[u8], signature: &DigitalSignature) -> Result<bool> {
        let key = self
            .verification_key
            .as_ref()
            .ok_or_else(|| missing_verification_key(S_CASA))?;
        if !matches_algorithm(S_CASA, signature) {
            return Ok(false);
        }
        let Some(sigma) = decode_g1(signature.data()) else {
            return Ok(false);
        };
        let g2 = G2Affine::generator();
        let message = G1Affine::from(hash_to_g1(data, MESSAGE_DST));
        let lhs = pairing(&sigma, &g2);
        let rhs = pairing(&key.ppk, &g2) + pairing(&message, &key.x_g2);
        Ok(lhs == rhs)
    }
}

impl Authenticator for CasaAuthenticator {
    fn initialize_key_pair(&mut self) -> Result<()> {
        let mut wide = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut wide);
        let x = Scalar::from_bytes_wide(&wide);
        let ppk = self.partial_private_key();

        self.verification_key = Some(PublicKey {
            ppk: G1Affine::from(ppk),
            x_g2: G2Affine::from(G2Projective::generator() * x),
        });
        self.signing_key = Some(SecretKey { ppk, x });
        Ok(())
    }

    fn verification_key(&self) -> Result<EncodedKey> {
        let key = self
            .verification_key
            .as_ref()
            .ok_or_else(|| missing_verification_key(S_CASA))?;
        Ok(EncodedKey::new(S_CASA, key.encode()))
    }

    fn set_verification_key(&mut self, key: &EncodedKey) -> Result<()> {
        ensure_key_algorithm(S_CASA, key)?;
        self.verification_key = Some(PublicKey::decode(key.key())?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_identity_same_partial_key() {
        let a = CasaAuthenticator::with_identity(b"pep-a".to_vec());
        let b = CasaAuthenticator::with_identity(b"pep-a".to_vec());
        let c = CasaAuthenticator::with_identity(b"pep-b".to_vec());
        assert_eq!(
            G1Affine::from(a.partial_private_key()),
            G1Affine::from(b.partial_private_key())
        );
        assert_ne!(
            G1Affine::from(a.partial_private_key()),
            G1Affine::from(c.partial_private_key())
        );
    }

    #[test]
    fn test_foreign_key_rejects_signature() {
        let mut a = CasaAuthenticator::with_identity(b"pep-a".to_vec());
        let mut b = CasaAuthenticator::with_identity(b"pep-a".to_vec());
        a.initialize_key_pair().unwrap();
        b.initialize_key_pair().unwrap();
        let signature = a.sign(b"data").unwrap();
        assert!(a.verify(b"data", &signature).unwrap());
        // same identity, different node secret
        assert!(!b.verify(b"data", &signature).unwrap());
    }

    #[test]
    fn test_key_encoding_length_checked() {
        let mut a = CasaAuthenticator::new();
        assert!(a
            .set_verification_key(&EncodedKey::new(S_CASA, vec![0; 10]))
            .is_err());
    }
}
