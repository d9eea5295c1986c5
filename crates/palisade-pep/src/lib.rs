//! # Palisade Enforcement Point
//!
//! Sits between a secure network segment and an insecure one. Frames leaving
//! the secure side are tunnelled to the next enforcement point only when the
//! decision point grants it; tunnelled frames arriving from other enforcement
//! points are released into the secure side only under an incoming grant.
//!
//! - [`AccessController`]: per-frame and per-message enforcement logic
//! - [`NetworkBridge`]: the six loops that connect the controller to the
//!   network
//! - [`ForwardingBridge`]: unfiltered forwarding, for measurements without
//!   access control
//! - [`PepConfig`]: file and command-line configuration

pub mod access_controller;
pub mod bridge;
pub mod config;

pub use access_controller::AccessController;
pub use bridge::{BridgeConfig, ForwardingBridge, NetworkBridge};
pub use config::{PepConfig, TunnelEndpoint};
