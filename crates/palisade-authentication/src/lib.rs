//! # Palisade Authentication
//!
//! Authenticity of control-plane messages. The [`AuthenticationClient`] signs
//! everything a node sends and verifies everything it receives, fetching the
//! keys of remote hosts through the key-exchange protocol. Key fetches, like
//! access-decision fetches on the enforcement point, are
//! [`RequestableResource`]s: blocking cache entries filled by a remote answer.
//! [`CryptoConfig`] is the configuration-file form of a node's identity.

pub mod client;
pub mod config;
pub mod requestable;

pub use client::{AuthenticationClient, SharedVerifier, TrustedKey};
pub use config::CryptoConfig;
pub use requestable::{
    RequestBuilder, RequestConfig, RequestableResource, DEFAULT_RETRIES, DEFAULT_TIMEOUT_MS,
};
