//! Message signing and verification with on-demand key exchange.
//!
//! Every node signs with one [`Authenticator`]. Verifiers for remote hosts are
//! cached per `(host, algorithm)` and fetched lazily: the first message from
//! an unknown host triggers a key-exchange request, and the answer is only
//! installed when it carries a valid signature under the key it advertises.
//!
//! Keys learnt this way are trusted on first use. Hosts whose keys are known
//! up front should be pinned with [`AuthenticationClient::trust`].

use crate::requestable::{RequestBuilder, RequestConfig, RequestableResource};
use palisade_core::{
    AccessControlMessage, EncodedKey, MessageEgress, MessagePayload, PalisadeError, Result,
};
use palisade_crypto::{create_by_identifier, Authenticator, SUPPORTED_ALGORITHMS};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// Shared verifier handle.
pub type SharedVerifier = Arc<dyn Authenticator>;

type VerifierEntry = Arc<RequestableResource<SharedVerifier>>;

/// Verification key of a host, known before the host is first heard from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedKey {
    /// Host the key belongs to
    pub host: IpAddr,
    /// Key and its algorithm
    #[serde(flatten)]
    pub key: EncodedKey,
}

/// Asks a remote host for its verification key.
struct KeyExchangeRequestBuilder {
    host: IpAddr,
    algorithm: String,
    signer: Arc<dyn Authenticator>,
}

impl RequestBuilder for KeyExchangeRequestBuilder {
    fn build_request(&self) -> Result<AccessControlMessage> {
        let request = AccessControlMessage::key_exchange_request(self.host, self.algorithm.clone());
        let signature = self.signer.sign(&request.signing_data())?;
        Ok(request.with_signature(signature))
    }
}

/// Signs outgoing and verifies incoming control-plane messages.
pub struct AuthenticationClient {
    authenticator: Arc<dyn Authenticator>,
    egress: MessageEgress,
    config: RequestConfig,
    verifiers: Mutex<HashMap<(IpAddr, String), VerifierEntry>>,
}

impl std::fmt::Debug for AuthenticationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationClient")
            .field("algorithm", &self.authenticator.algorithm_identifier())
            .field("known_hosts", &self.verifiers.lock().len())
            .finish_non_exhaustive()
    }
}

impl AuthenticationClient {
    /// Client that generates a fresh key pair for `authenticator`.
    pub fn new(mut authenticator: Box<dyn Authenticator>, egress: MessageEgress) -> Result<Self> {
        authenticator.initialize_key_pair()?;
        Ok(Self::with_provisioned(authenticator, egress))
    }

    /// Client for an authenticator whose key material is already in place,
    /// such as an HMAC authenticator holding a pre-shared key.
    pub fn with_provisioned(authenticator: Box<dyn Authenticator>, egress: MessageEgress) -> Self {
        tracing::info!(
            algorithm = authenticator.algorithm_identifier(),
            "authentication client ready"
        );
        Self {
            authenticator: Arc::from(authenticator),
            egress,
            config: RequestConfig::default(),
            verifiers: Mutex::new(HashMap::new()),
        }
    }

    /// Use a different retry budget for key-exchange requests.
    pub fn with_request_config(mut self, config: RequestConfig) -> Self {
        self.config = config;
        self
    }

    /// Algorithm this node signs with.
    pub fn algorithm_identifier(&self) -> &str {
        self.authenticator.algorithm_identifier()
    }

    /// This node's verification key.
    pub fn verification_key(&self) -> Result<EncodedKey> {
        self.authenticator.verification_key()
    }

    /// Copy of `message` signed with this node's key.
    pub fn sign_message(&self, message: &AccessControlMessage) -> Result<AccessControlMessage> {
        let signature = self.authenticator.sign(&message.signing_data())?;
        Ok(message.with_signature(signature))
    }

    /// Check the signature of `message` against its source's key.
    ///
    /// Blocks while the key is fetched. Unsigned messages, messages without a
    /// source and hosts that never answer all fail verification.
    pub fn verify_message(&self, message: &AccessControlMessage) -> bool {
        let Some(signature) = message.signature() else {
            tracing::debug!(kind = %message.kind(), source = ?message.source(), "unsigned message");
            return false;
        };
        let Some(source) = message.source() else {
            tracing::debug!(kind = %message.kind(), "message without source");
            return false;
        };
        if !SUPPORTED_ALGORITHMS.contains(&signature.algorithm()) {
            tracing::debug!(%source, algorithm = signature.algorithm(), "unsupported algorithm");
            return false;
        }

        let verifier = match self.verifier_entry(source, signature.algorithm()).get() {
            Ok(verifier) => verifier,
            Err(error) => {
                tracing::warn!(%source, %error, "no verifier available");
                return false;
            }
        };
        match verifier.verify(&message.signing_data(), signature) {
            Ok(valid) => {
                if !valid {
                    tracing::warn!(%source, kind = %message.kind(), "invalid signature");
                }
                valid
            }
            Err(error) => {
                tracing::warn!(%source, %error, "verification failed");
                false
            }
        }
    }

    /// Dispatch key-exchange messages. Returns false for any other kind.
    pub fn handle_message(&self, message: &AccessControlMessage) -> bool {
        match message.payload() {
            MessagePayload::KeyExchangeRequest(_) => self.process_key_exchange_request(message),
            MessagePayload::KeyExchange(_) => self.process_key_exchange(message),
            _ => return false,
        }
        true
    }

    /// Answer a key request with this node's key, if it asks for the
    /// algorithm in use.
    pub fn process_key_exchange_request(&self, message: &AccessControlMessage) {
        let MessagePayload::KeyExchangeRequest(algorithm) = message.payload() else {
            return;
        };
        let Some(source) = message.source() else {
            return;
        };
        if algorithm != self.algorithm_identifier() {
            tracing::debug!(%source, %algorithm, "key request for algorithm not in use");
            return;
        }

        let response = self
            .verification_key()
            .map(|key| AccessControlMessage::key_exchange(source, key))
            .and_then(|response| self.sign_message(&response));
        match response {
            Ok(response) => self.egress.enqueue(response),
            Err(error) => tracing::warn!(%source, %error, "cannot answer key request"),
        }
    }

    /// Install the key advertised by a key-exchange answer.
    ///
    /// The answer must be signed under the key it carries. A verifier that is
    /// already in place is never replaced.
    pub fn process_key_exchange(&self, message: &AccessControlMessage) {
        let MessagePayload::KeyExchange(key) = message.payload() else {
            return;
        };
        let Some(source) = message.source() else {
            return;
        };
        let Some(signature) = message.signature() else {
            tracing::warn!(%source, "unsigned key exchange rejected");
            return;
        };

        let verifier = match verifier_for_key(key) {
            Ok(verifier) => verifier,
            Err(error) => {
                tracing::warn!(%source, %error, "key exchange rejected");
                return;
            }
        };
        if !matches!(verifier.verify(&message.signing_data(), signature), Ok(true)) {
            tracing::warn!(
                %source,
                algorithm = key.algorithm(),
                "key exchange with invalid self-signature"
            );
            return;
        }

        let entry = self.verifier_entry(source, key.algorithm());
        if entry.is_unavailable() {
            tracing::info!(%source, algorithm = key.algorithm(), "verifier installed");
            entry.set(verifier);
        } else {
            tracing::warn!(
                %source,
                algorithm = key.algorithm(),
                "ignoring key for already known host"
            );
        }
    }

    /// Pin the verification key of `host`, bypassing key exchange.
    pub fn trust(&self, host: IpAddr, key: &EncodedKey) -> Result<()> {
        let verifier = verifier_for_key(key)?;
        let entry = self.verifier_entry(host, key.algorithm());
        entry.set(verifier);
        tracing::info!(%host, algorithm = key.algorithm(), "trusted key pinned");
        Ok(())
    }

    /// Pin every key in `keys`.
    pub fn trust_all<'a>(&self, keys: impl IntoIterator<Item = &'a TrustedKey>) -> Result<()> {
        keys.into_iter()
            .try_for_each(|trusted| self.trust(trusted.host, &trusted.key))
    }

    /// Ask `host` for its key ahead of its first message.
    ///
    /// The answer is installed like any other key exchange; nothing blocks.
    pub fn request_key(&self, host: IpAddr) -> Result<()> {
        let request = AccessControlMessage::key_exchange_request(host, self.algorithm_identifier());
        self.egress.enqueue(self.sign_message(&request)?);
        tracing::debug!(%host, "verification key requested");
        Ok(())
    }

    /// Whether a verifier for `host` and `algorithm` is in place.
    pub fn knows(&self, host: IpAddr, algorithm: &str) -> bool {
        self.verifiers
            .lock()
            .get(&(host, algorithm.to_string()))
            .is_some_and(|entry| !entry.is_unavailable())
    }

    /// Cancel every pending key request.
    pub fn close(&self) {
        for entry in self.verifiers.lock().values() {
            entry.close();
        }
    }

    fn verifier_entry(&self, host: IpAddr, algorithm: &str) -> VerifierEntry {
        let mut verifiers = self.verifiers.lock();
        verifiers
            .entry((host, algorithm.to_string()))
            .or_insert_with(|| {
                let builder = KeyExchangeRequestBuilder {
                    host,
                    algorithm: algorithm.to_string(),
                    signer: self.authenticator.clone(),
                };
                Arc::new(RequestableResource::new(
                    self.config,
                    Box::new(builder),
                    self.egress.clone(),
                ))
            })
            .clone()
    }
}

fn verifier_for_key(key: &EncodedKey) -> Result<SharedVerifier> {
    let mut verifier = create_by_identifier(key.algorithm())?;
    verifier.set_verification_key(key).map_err(|error| {
        PalisadeError::crypto(format!("unusable {} key: {error}", key.algorithm()))
    })?;
    Ok(Arc::from(verifier))
}
