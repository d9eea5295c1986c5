//! Opaque key and signature material exchanged between nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Public key bytes tagged with the algorithm that understands them.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodedKey {
    algorithm: String,
    #[serde(with = "hex")]
    key: Vec<u8>,
}

impl EncodedKey {
    /// Wrap key bytes for `algorithm`.
    pub fn new(algorithm: impl Into<String>, key: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            key,
        }
    }

    /// Algorithm identifier.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Encoded key bytes.
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedKey")
            .field("algorithm", &self.algorithm)
            .field("key", &hex::encode(&self.key))
            .finish()
    }
}

/// Signature bytes tagged with the algorithm that produced them.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DigitalSignature {
    algorithm: String,
    #[serde(with = "hex")]
    data: Vec<u8>,
}

impl DigitalSignature {
    /// Wrap signature bytes produced by `algorithm`.
    pub fn new(algorithm: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            data,
        }
    }

    /// Algorithm identifier.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Raw signature bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for DigitalSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalSignature")
            .field("algorithm", &self.algorithm)
            .field("data", &hex::encode(&self.data))
            .finish()
    }
}
