//! Node identity settings as they appear in configuration files.

use crate::client::{AuthenticationClient, TrustedKey};
use crate::requestable::RequestConfig;
use palisade_core::{MessageEgress, PalisadeError, Result};
use palisade_crypto::{create_by_identifier, HmacAuthenticator, ED25519, HMAC_SHA512_256};
use serde::{Deserialize, Serialize};

/// Signature scheme, key material and key-exchange budget of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Algorithm identifier, e.g. `Ed25519` or `SHA256withRSA`
    pub algorithm: String,
    /// Hex-encoded pre-shared key; HMAC only
    pub shared_key: Option<String>,
    /// Retry budget for key requests
    pub requests: RequestConfig,
    /// Keys pinned before any exchange
    pub trusted_keys: Vec<TrustedKey>,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            algorithm: ED25519.to_string(),
            shared_key: None,
            requests: RequestConfig::default(),
            trusted_keys: Vec::new(),
        }
    }
}

impl CryptoConfig {
    /// Settings for `algorithm` with everything else defaulted.
    pub fn for_algorithm(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            ..Self::default()
        }
    }

    /// Build the node's authentication client, sending through `egress`.
    ///
    /// A fresh key pair is generated unless a shared key is configured.
    /// Trusted keys are pinned before the client is returned.
    pub fn client(&self, egress: MessageEgress) -> Result<AuthenticationClient> {
        let client = match &self.shared_key {
            Some(encoded) => {
                if self.algorithm != HMAC_SHA512_256 {
                    return Err(PalisadeError::invalid(format!(
                        "shared keys are only supported for {HMAC_SHA512_256}, not {}",
                        self.algorithm
                    )));
                }
                let key = hex::decode(encoded)
                    .map_err(|e| PalisadeError::invalid(format!("shared key: {e}")))?;
                AuthenticationClient::with_provisioned(
                    Box::new(HmacAuthenticator::with_shared_key(key)),
                    egress,
                )
            }
            None => AuthenticationClient::new(create_by_identifier(&self.algorithm)?, egress)?,
        }
        .with_request_config(self.requests);
        client.trust_all(&self.trusted_keys)?;
        Ok(client)
    }
}
