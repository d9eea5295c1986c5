//! Control-plane messages over UDP.
//!
//! Messages leave from [`MESSAGE_EGRESS_PORT`] towards the destination's
//! [`MESSAGE_INGRESS_PORT`]. Each received datagram is decoded, stamped with
//! its origin and handed to the message handler on a thread of its own, so a
//! handler blocked on key exchange never stalls reception.

use crate::codec::{self, MAX_DATAGRAM_SIZE};
use crate::{spawn_worker, Shutdown};
use palisade_core::{AccessControlMessage, MessageEgress, Result};
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Port messages are received on.
pub const MESSAGE_INGRESS_PORT: u16 = 10000;

/// Port messages are sent from.
pub const MESSAGE_EGRESS_PORT: u16 = 10001;

/// Callback for every received message.
pub type MessageHandler = Arc<dyn Fn(AccessControlMessage) + Send + Sync>;

/// Socket options shared by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpOptions {
    /// Set `SO_REUSEADDR` before binding
    pub reuse_address: bool,
    /// Socket read and queue poll timeout in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for UdpOptions {
    fn default() -> Self {
        Self {
            reuse_address: true,
            poll_interval_ms: 100,
        }
    }
}

impl UdpOptions {
    /// Poll timeout as a duration, never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Bind a UDP socket with `options` applied.
pub fn bind_udp(local: SocketAddr, options: &UdpOptions) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(local), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(options.reuse_address)?;
    socket.bind(&local.into())?;
    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(options.poll_interval()))?;
    Ok(socket)
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Drains the outbound message queue onto the network.
pub struct MessageEgressHandler {
    socket: UdpSocket,
    remote_port: u16,
    queue: Receiver<AccessControlMessage>,
    shutdown: Shutdown,
    poll: Duration,
}

impl MessageEgressHandler {
    /// Bind to `local` and return the handler with the queue feeding it.
    pub fn bind(
        local: SocketAddr,
        remote_port: u16,
        options: &UdpOptions,
        shutdown: Shutdown,
    ) -> Result<(Self, MessageEgress)> {
        let socket = bind_udp(local, options)?;
        let (tx, queue) = mpsc::channel();
        let handler = Self {
            socket,
            remote_port,
            queue,
            shutdown,
            poll: options.poll_interval(),
        };
        Ok((handler, Arc::new(tx)))
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Send queued messages until shutdown or until every queue handle is gone.
    pub fn run(self) {
        tracing::debug!(local = ?self.socket.local_addr().ok(), "message egress started");
        while !self.shutdown.is_triggered() {
            match self.queue.recv_timeout(self.poll) {
                Ok(message) => self.send(&message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::debug!("message egress stopped");
    }

    /// Run on a dedicated thread.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        spawn_worker("message-egress", move || self.run())
    }

    fn send(&self, message: &AccessControlMessage) {
        let target = SocketAddr::new(message.destination(), self.remote_port);
        let sent = codec::encode(message)
            .and_then(|bytes| Ok(self.socket.send_to(&bytes, target)?));
        match sent {
            Ok(_) => tracing::trace!(%target, kind = %message.kind(), "message sent"),
            Err(error) => tracing::warn!(%target, kind = %message.kind(), %error, "message not sent"),
        }
    }
}

/// Receives messages and dispatches them to a handler.
pub struct MessageIngressHandler {
    socket: UdpSocket,
    handler: MessageHandler,
    shutdown: Shutdown,
}

impl MessageIngressHandler {
    /// Bind to `local`; every decoded message goes to `handler`.
    pub fn bind(
        local: SocketAddr,
        options: &UdpOptions,
        shutdown: Shutdown,
        handler: MessageHandler,
    ) -> Result<Self> {
        Ok(Self {
            socket: bind_udp(local, options)?,
            handler,
            shutdown,
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive until shutdown.
    pub fn run(self) {
        tracing::debug!(local = ?self.socket.local_addr().ok(), "message ingress started");
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        while !self.shutdown.is_triggered() {
            let (length, peer) = match self.socket.recv_from(&mut buffer) {
                Ok(received) => received,
                Err(error) if is_timeout(&error) => continue,
                Err(error) => {
                    tracing::warn!(%error, "message receive failed");
                    continue;
                }
            };
            let message = match codec::decode(&buffer[..length], peer.ip()) {
                Ok(message) => message,
                Err(error) => {
                    tracing::warn!(%peer, %error, "dropping undecodable datagram");
                    continue;
                }
            };
            tracing::trace!(%peer, kind = %message.kind(), "message received");
            let handler = self.handler.clone();
            if let Err(error) = spawn_worker("message-handler", move || handler(message)) {
                tracing::warn!(%error, "dropping message");
            }
        }
        tracing::debug!("message ingress stopped");
    }

    /// Run on a dedicated thread.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        spawn_worker("message-ingress", move || self.run())
    }
}
