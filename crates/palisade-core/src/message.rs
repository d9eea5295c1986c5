//! Control-plane messages exchanged between enforcement and decision points.
//!
//! Every payload variant defines its own canonical signing data, so a
//! signature never depends on the wire encoding. Messages are values:
//! [`AccessControlMessage::with_signature`] and
//! [`AccessControlMessage::from_source`] return new instances.

use crate::attribute::{AttributeId, PolicyAttribute};
use crate::crypto::{DigitalSignature, EncodedKey};
use crate::decision::AccessDecision;
use crate::frame::Frame;
use crate::pattern::AccessRequestPattern;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Discriminant of a message payload, for logging and dispatch tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Request for a decision on a pattern
    AccessRequest,
    /// Decision issued by the decision point
    AccessDecision,
    /// Tunnelled frame
    PayloadExchange,
    /// Request for a verification key
    KeyExchangeRequest,
    /// Advertised verification key
    KeyExchange,
    /// Attribute update
    AttributeExchange,
    /// Request for attribute values
    AttributeExchangeRequest,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AccessRequest => "access-request",
            Self::AccessDecision => "access-decision",
            Self::PayloadExchange => "payload-exchange",
            Self::KeyExchangeRequest => "key-exchange-request",
            Self::KeyExchange => "key-exchange",
            Self::AttributeExchange => "attribute-exchange",
            Self::AttributeExchangeRequest => "attribute-exchange-request",
        };
        f.write_str(name)
    }
}

/// Message payload; the `type` tag travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum MessagePayload {
    /// Request for a decision on a pattern
    AccessRequest(AccessRequestPattern),
    /// Decision issued by the decision point
    AccessDecision(AccessDecision),
    /// Tunnelled frame
    PayloadExchange(Frame),
    /// Request for the verification key of an algorithm
    KeyExchangeRequest(String),
    /// Advertised verification key
    KeyExchange(EncodedKey),
    /// Attribute update
    AttributeExchange(Vec<PolicyAttribute>),
    /// Request for attribute values
    AttributeExchangeRequest(Vec<AttributeId>),
}

impl MessagePayload {
    /// Payload discriminant.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::AccessRequest(_) => MessageKind::AccessRequest,
            Self::AccessDecision(_) => MessageKind::AccessDecision,
            Self::PayloadExchange(_) => MessageKind::PayloadExchange,
            Self::KeyExchangeRequest(_) => MessageKind::KeyExchangeRequest,
            Self::KeyExchange(_) => MessageKind::KeyExchange,
            Self::AttributeExchange(_) => MessageKind::AttributeExchange,
            Self::AttributeExchangeRequest(_) => MessageKind::AttributeExchangeRequest,
        }
    }

    /// Canonical bytes signed on behalf of this payload.
    pub fn signing_data(&self) -> Vec<u8> {
        match self {
            Self::AccessRequest(pattern) => pattern.signing_data(),
            Self::AccessDecision(decision) => decision.signing_data(),
            Self::PayloadExchange(frame) => frame.as_bytes().to_vec(),
            Self::KeyExchangeRequest(algorithm) => algorithm.as_bytes().to_vec(),
            Self::KeyExchange(key) => {
                let mut out = key.algorithm().as_bytes().to_vec();
                out.extend_from_slice(key.key());
                out
            }
            Self::AttributeExchange(attributes) => {
                let mut sorted: Vec<_> = attributes.iter().collect();
                sorted.sort_by(|a, b| a.identifier().cmp(b.identifier()));
                let mut out = Vec::new();
                for attribute in sorted {
                    attribute.write_signing_data(&mut out);
                }
                out
            }
            Self::AttributeExchangeRequest(identifiers) => {
                identifiers.iter().flat_map(|id| id.bytes()).collect()
            }
        }
    }
}

/// Envelope for every control-plane message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlMessage {
    /// Stamped on receipt; never trusted from the wire.
    #[serde(skip)]
    source: Option<IpAddr>,
    destination: IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<DigitalSignature>,
    payload: MessagePayload,
}

impl AccessControlMessage {
    /// Unsigned message to `destination`.
    pub fn new(destination: IpAddr, payload: MessagePayload) -> Self {
        Self {
            source: None,
            destination,
            signature: None,
            payload,
        }
    }

    /// Request for a decision on `pattern`.
    pub fn access_request(destination: IpAddr, pattern: AccessRequestPattern) -> Self {
        Self::new(destination, MessagePayload::AccessRequest(pattern))
    }

    /// Decision addressed to `destination`.
    pub fn access_decision(destination: IpAddr, decision: AccessDecision) -> Self {
        Self::new(destination, MessagePayload::AccessDecision(decision))
    }

    /// Tunnelled frame for `destination`.
    pub fn payload_exchange(destination: IpAddr, frame: Frame) -> Self {
        Self::new(destination, MessagePayload::PayloadExchange(frame))
    }

    /// Request for the key `destination` uses with `algorithm`.
    pub fn key_exchange_request(destination: IpAddr, algorithm: impl Into<String>) -> Self {
        Self::new(destination, MessagePayload::KeyExchangeRequest(algorithm.into()))
    }

    /// Key advertisement for `destination`.
    pub fn key_exchange(destination: IpAddr, key: EncodedKey) -> Self {
        Self::new(destination, MessagePayload::KeyExchange(key))
    }

    /// Observed sender, present once received.
    pub fn source(&self) -> Option<IpAddr> {
        self.source
    }

    /// Intended receiver.
    pub fn destination(&self) -> IpAddr {
        self.destination
    }

    /// Attached signature, if signed.
    pub fn signature(&self) -> Option<&DigitalSignature> {
        self.signature.as_ref()
    }

    /// Whether a signature is attached.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Payload.
    pub fn payload(&self) -> &MessagePayload {
        &self.payload
    }

    /// Payload discriminant.
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Canonical bytes of the payload.
    pub fn signing_data(&self) -> Vec<u8> {
        self.payload.signing_data()
    }

    /// Copy of this message carrying `signature`.
    pub fn with_signature(&self, signature: DigitalSignature) -> Self {
        Self {
            signature: Some(signature),
            ..self.clone()
        }
    }

    /// This message stamped with its observed sender.
    pub fn from_source(self, source: IpAddr) -> Self {
        Self {
            source: Some(source),
            ..self
        }
    }

    /// Take the payload.
    pub fn into_payload(self) -> MessagePayload {
        self.payload
    }
}

impl fmt::Display for AccessControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Some(source) => write!(f, "{} {} -> {}", self.kind(), source, self.destination),
            None => write!(f, "{} -> {}", self.kind(), self.destination),
        }
    }
}
