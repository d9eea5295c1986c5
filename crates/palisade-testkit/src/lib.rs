//! Palisade Testing Infrastructure
//!
//! Fixtures shared by the integration suites of every Palisade crate: the lab
//! topology used throughout the tests, raw frame builders, an in-memory
//! control-plane network and proptest strategies for patterns.
//!
//! ```toml
//! [dev-dependencies]
//! palisade-testkit = { path = "../palisade-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod frames;
pub mod network;
pub mod strategies;

pub use fixtures::*;
pub use frames::*;
pub use network::{RecordingEgress, TestNetwork};

pub use palisade_core::{ManualClock, SystemClock, Timestamp};
