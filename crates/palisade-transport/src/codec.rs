//! JSON wire encoding of control-plane messages.
//!
//! The sender address is not part of the encoding; receivers stamp it from the
//! datagram's origin.

use palisade_core::{AccessControlMessage, PalisadeError, Result};
use std::net::IpAddr;

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Encode `message` for the wire.
pub fn encode(message: &AccessControlMessage) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(PalisadeError::serialization(format!(
            "{} message of {} bytes exceeds a datagram",
            message.kind(),
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Decode a datagram received from `source`.
pub fn decode(bytes: &[u8], source: IpAddr) -> Result<AccessControlMessage> {
    let message: AccessControlMessage = serde_json::from_slice(bytes)?;
    Ok(message.from_source(source))
}
