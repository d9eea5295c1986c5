//! # Palisade Crypto
//!
//! Pluggable signature schemes for control-plane messages, selected by the
//! algorithm identifier carried in every signature and exchanged key:
//!
//! - `Ed25519`
//! - the RSA PKCS#1 v1.5 family (`SHA256withRSA`, `SHA3-512withRSA`, ...)
//! - `HmacSHA512/256` (symmetric, pre-shared keys only)
//! - `S_CASA`, a pairing-based identity signature over BLS12-381
//! - `NoOperation`, for benchmarks
//!
//! All schemes sign canonical signing data, never a wire encoding.

pub mod authenticator;
pub mod ed25519;
pub mod factory;
pub mod identity;
pub mod mac;
pub mod noop;
pub mod rsa_family;

pub use authenticator::{Authenticator, Signer, Verifier};
pub use ed25519::{Ed25519Authenticator, ED25519};
pub use factory::{create_by_identifier, SUPPORTED_ALGORITHMS};
pub use identity::{CasaAuthenticator, S_CASA};
pub use mac::{HmacAuthenticator, HMAC_SHA512_256};
pub use noop::{NoOperationAuthenticator, NO_OPERATION};
pub use rsa_family::{RsaAuthenticator, RsaDigest};
