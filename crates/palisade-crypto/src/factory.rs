//! Authenticator selection by algorithm identifier.

use crate::authenticator::Authenticator;
use crate::ed25519::{Ed25519Authenticator, ED25519};
use crate::identity::{CasaAuthenticator, S_CASA};
use crate::mac::{HmacAuthenticator, HMAC_SHA512_256};
use crate::noop::{NoOperationAuthenticator, NO_OPERATION};
use crate::rsa_family::{RsaAuthenticator, RsaDigest};
use palisade_core::{PalisadeError, Result};

/// Every identifier [`create_by_identifier`] accepts.
pub const SUPPORTED_ALGORITHMS: [&str; 9] = [
    ED25519,
    "SHA256withRSA",
    "SHA512withRSA",
    "SHA3-256withRSA",
    "SHA3-512withRSA",
    "MD5withRSA",
    HMAC_SHA512_256,
    S_CASA,
    NO_OPERATION,
];

/// Create an authenticator without key material for `identifier`.
pub fn create_by_identifier(identifier: &str) -> Result<Box<dyn Authenticator>> {
    let authenticator: Box<dyn Authenticator> = match identifier {
        ED25519 => Box::new(Ed25519Authenticator::new()),
        HMAC_SHA512_256 => Box::new(HmacAuthenticator::new()),
        S_CASA => Box::new(CasaAuthenticator::new()),
        NO_OPERATION => Box::new(NoOperationAuthenticator::new()),
        rsa_id if rsa_id.ends_with("withRSA") => {
            let digest = RsaDigest::from_identifier(rsa_id).ok_or_else(|| unknown(rsa_id))?;
            Box::new(RsaAuthenticator::new(digest))
        }
        other => return Err(unknown(other)),
    };
    Ok(authenticator)
}

fn unknown(identifier: &str) -> PalisadeError {
    PalisadeError::not_found(format!("unknown signature algorithm '{identifier}'"))
}
