//! # Palisade Decision Point
//!
//! Answers access requests from enforcement points. Decisions come from
//! static rules kept valid in the background and from attribute policies
//! that are re-evaluated whenever attribute providers report new values.
//!
//! [`PdpService`] binds the message sockets and runs the
//! [`AuthorizationController`](palisade_authorization::AuthorizationController)
//! behind them; [`PdpConfig`] describes what it serves.

pub mod config;
pub mod service;

pub use config::{PdpConfig, StaticDecision};
pub use service::PdpService;
