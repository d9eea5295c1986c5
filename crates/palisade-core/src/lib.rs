//! # Palisade Core
//!
//! Shared vocabulary of the access-control overlay: traffic patterns and their
//! containment relation, access decisions, policy attributes, control-plane
//! messages with their canonical signing data, and the unified error type.
//!
//! Nothing in this crate blocks or performs I/O; the authentication,
//! authorization and transport crates build on these types.

pub mod attribute;
pub mod crypto;
pub mod decision;
pub mod egress;
pub mod errors;
pub mod frame;
pub mod message;
pub mod net;
pub mod pattern;
pub mod time;

pub use attribute::{AttributeId, AttributeSet, AttributeValue, PolicyAttribute};
pub use crypto::{DigitalSignature, EncodedKey};
pub use decision::{AccessDecision, Action};
pub use egress::{EgressQueue, FrameEgress, MessageEgress};
pub use errors::{PalisadeError, Result};
pub use frame::{derive_pattern, Frame};
pub use message::{AccessControlMessage, MessageKind, MessagePayload};
pub use net::{EtherType, IpProtocol, MacAddress};
pub use pattern::{AccessRequestPattern, PatternLayer};
pub use time::{ManualClock, PhysicalClock, SystemClock, Timestamp};
