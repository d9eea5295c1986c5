//! # Palisade Transport
//!
//! Byte-level plumbing around the access-control logic:
//!
//! - [`codec`]: JSON encoding of control-plane messages
//! - [`udp`]: message ingress and egress handlers on reusable UDP sockets
//! - [`interface`]: the [`FrameInterface`] seam standing in for link-layer
//!   capture, with channel and UDP-tunnel implementations and the frame
//!   ingress/egress loops that drive them
//! - [`bypass`]: frame classes that skip access control
//!
//! Every handler runs on its own thread and polls a shared [`Shutdown`] flag
//! between socket or channel timeouts.

pub mod bypass;
pub mod codec;
pub mod interface;
pub mod udp;

pub use bypass::{BypassPredicate, BypassRule};
pub use codec::{decode, encode, MAX_DATAGRAM_SIZE};
pub use interface::{
    ChannelFrameInterface, FrameEgressHandler, FrameHandler, FrameIngressHandler, FrameInterface,
    UdpFrameInterface,
};
pub use udp::{
    bind_udp, MessageEgressHandler, MessageHandler, MessageIngressHandler, UdpOptions,
    MESSAGE_EGRESS_PORT, MESSAGE_INGRESS_PORT,
};

use palisade_core::{PalisadeError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Cooperative stop signal shared by a group of handler threads.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    /// Signal that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every loop holding this signal to stop.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether [`Shutdown::trigger`] was called.
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Start a named thread, reporting spawn failure as an error.
pub fn spawn_worker(
    name: &str,
    work: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(work)
        .map_err(|e| PalisadeError::internal(format!("cannot start {name}: {e}")))
}
