//! Link-layer frame interfaces and the loops that drive them.
//!
//! Promiscuous capture is outside this crate; anything that can hand over and
//! accept raw frames implements [`FrameInterface`]. Two implementations ship
//! here: an in-memory channel pair and a UDP tunnel that carries one frame per
//! datagram to a fixed peer.

use crate::udp::{bind_udp, UdpOptions};
use crate::{spawn_worker, Shutdown};
use palisade_core::{Frame, FrameEgress, PalisadeError, Result};
use parking_lot::Mutex;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Source and sink of raw frames on one side of an enforcement point.
pub trait FrameInterface: Send + Sync {
    /// Wait up to `timeout` for the next frame.
    fn receive(&self, timeout: Duration) -> Result<Option<Frame>>;

    /// Put `frame` on the wire.
    fn send(&self, frame: &Frame) -> Result<()>;
}

/// Callback for every received frame.
pub type FrameHandler = Arc<dyn Fn(Frame) + Send + Sync>;

/// One end of an in-memory link.
pub struct ChannelFrameInterface {
    outbound: Sender<Frame>,
    inbound: Mutex<Receiver<Frame>>,
}

impl ChannelFrameInterface {
    /// Two connected ends: frames sent on one are received on the other.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel();
        let (b_tx, b_rx) = mpsc::channel();
        (
            Self {
                outbound: a_tx,
                inbound: Mutex::new(b_rx),
            },
            Self {
                outbound: b_tx,
                inbound: Mutex::new(a_rx),
            },
        )
    }
}

impl FrameInterface for ChannelFrameInterface {
    fn receive(&self, timeout: Duration) -> Result<Option<Frame>> {
        match self.inbound.lock().recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(PalisadeError::network("link peer disconnected"))
            }
        }
    }

    fn send(&self, frame: &Frame) -> Result<()> {
        self.outbound
            .send(frame.clone())
            .map_err(|_| PalisadeError::network("link peer disconnected"))
    }
}

/// Frames tunnelled over UDP to and from a fixed peer.
pub struct UdpFrameInterface {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpFrameInterface {
    /// Bind to `local` and exchange frames with `peer`.
    pub fn bind(local: SocketAddr, peer: SocketAddr, options: &UdpOptions) -> Result<Self> {
        Ok(Self {
            socket: bind_udp(local, options)?,
            peer,
        })
    }

    /// Address the tunnel endpoint is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl FrameInterface for UdpFrameInterface {
    fn receive(&self, timeout: Duration) -> Result<Option<Frame>> {
        self.socket
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        let mut buffer = vec![0u8; crate::MAX_DATAGRAM_SIZE];
        match self.socket.recv_from(&mut buffer) {
            Ok((length, origin)) if origin == self.peer => {
                buffer.truncate(length);
                Ok(Some(Frame::new(buffer)))
            }
            Ok((_, origin)) => {
                tracing::debug!(%origin, peer = %self.peer, "ignoring datagram from stranger");
                Ok(None)
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn send(&self, frame: &Frame) -> Result<()> {
        self.socket.send_to(frame.as_bytes(), self.peer)?;
        Ok(())
    }
}

/// Reads frames from an interface and hands each to a handler.
pub struct FrameIngressHandler {
    name: String,
    interface: Arc<dyn FrameInterface>,
    handler: FrameHandler,
    shutdown: Shutdown,
    poll: Duration,
}

impl FrameIngressHandler {
    /// Handler named `name` for log output.
    pub fn new(
        name: impl Into<String>,
        interface: Arc<dyn FrameInterface>,
        handler: FrameHandler,
        shutdown: Shutdown,
        poll: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            interface,
            handler,
            shutdown,
            poll,
        }
    }

    /// Receive until shutdown. Receive errors are logged and retried after one
    /// poll interval.
    pub fn run(self) {
        tracing::debug!(interface = %self.name, "frame ingress started");
        while !self.shutdown.is_triggered() {
            match self.interface.receive(self.poll) {
                Ok(Some(frame)) => (self.handler)(frame),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(interface = %self.name, %error, "frame receive failed");
                    thread::sleep(self.poll);
                }
            }
        }
        tracing::debug!(interface = %self.name, "frame ingress stopped");
    }

    /// Run on a dedicated thread.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let name = format!("{}-ingress", self.name);
        spawn_worker(&name, move || self.run())
    }
}

/// Drains a frame queue onto an interface.
pub struct FrameEgressHandler {
    name: String,
    interface: Arc<dyn FrameInterface>,
    queue: Receiver<Frame>,
    shutdown: Shutdown,
    poll: Duration,
}

impl FrameEgressHandler {
    /// Handler and the queue feeding it.
    pub fn new(
        name: impl Into<String>,
        interface: Arc<dyn FrameInterface>,
        shutdown: Shutdown,
        poll: Duration,
    ) -> (Self, FrameEgress) {
        let (tx, queue) = mpsc::channel();
        let handler = Self {
            name: name.into(),
            interface,
            queue,
            shutdown,
            poll,
        };
        (handler, Arc::new(tx))
    }

    /// Send queued frames until shutdown or until every queue handle is gone.
    pub fn run(self) {
        tracing::debug!(interface = %self.name, "frame egress started");
        while !self.shutdown.is_triggered() {
            match self.queue.recv_timeout(self.poll) {
                Ok(frame) => {
                    if let Err(error) = self.interface.send(&frame) {
                        tracing::warn!(interface = %self.name, %error, "frame not sent");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::debug!(interface = %self.name, "frame egress stopped");
    }

    /// Run on a dedicated thread.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let name = format!("{}-egress", self.name);
        spawn_worker(&name, move || self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use palisade_core::EgressQueue;
    use palisade_testkit::{arp_request_frame, blue_to_black_udp_frame, RecordingEgress};
    use std::net::{IpAddr, Ipv4Addr};

    const POLL: Duration = Duration::from_millis(10);

    fn localhost() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[test]
    fn test_channel_pair_is_crossed() {
        let (host, pep) = ChannelFrameInterface::pair();
        host.send(&arp_request_frame()).unwrap();
        assert_eq!(pep.receive(POLL).unwrap(), Some(arp_request_frame()));
        assert_eq!(host.receive(POLL).unwrap(), None);

        drop(pep);
        assert_matches!(host.receive(POLL), Err(PalisadeError::Network { .. }));
        assert_matches!(host.send(&arp_request_frame()), Err(PalisadeError::Network { .. }));
    }

    #[test]
    fn test_udp_tunnel_only_accepts_its_peer() {
        let options = UdpOptions::default();
        let probe = bind_udp(localhost(), &options).unwrap();
        let tunnel = UdpFrameInterface::bind(localhost(), probe.local_addr().unwrap(), &options)
            .unwrap();
        let tunnel_addr = tunnel.local_addr().unwrap();

        let frame = blue_to_black_udp_frame(1, 2);
        probe.send_to(frame.as_bytes(), tunnel_addr).unwrap();
        assert_eq!(tunnel.receive(Duration::from_secs(2)).unwrap(), Some(frame.clone()));

        let stranger = bind_udp(localhost(), &options).unwrap();
        stranger.send_to(frame.as_bytes(), tunnel_addr).unwrap();
        assert_eq!(tunnel.receive(Duration::from_secs(2)).unwrap(), None);

        tunnel.send(&frame).unwrap();
        let mut buffer = [0u8; 2048];
        let (length, origin) = probe.recv_from(&mut buffer).unwrap();
        assert_eq!(origin, tunnel_addr);
        assert_eq!(&buffer[..length], frame.as_bytes());
    }

    #[test]
    fn test_ingress_and_egress_loops() {
        let shutdown = Shutdown::new();
        let (host, pep) = ChannelFrameInterface::pair();
        let pep: Arc<dyn FrameInterface> = Arc::new(pep);

        let seen = RecordingEgress::<Frame>::new();
        let sink = seen.clone();
        let ingress = FrameIngressHandler::new(
            "test",
            pep.clone(),
            Arc::new(move |frame: Frame| sink.enqueue(frame)),
            shutdown.clone(),
            POLL,
        );
        let (egress, queue) = FrameEgressHandler::new("test", pep, shutdown.clone(), POLL);
        let workers = [ingress.spawn().unwrap(), egress.spawn().unwrap()];

        host.send(&arp_request_frame()).unwrap();
        assert!(seen.wait_for(1, Duration::from_secs(2)));
        queue.enqueue(blue_to_black_udp_frame(3, 4));
        assert_eq!(
            host.receive(Duration::from_secs(2)).unwrap(),
            Some(blue_to_black_udp_frame(3, 4))
        );

        shutdown.trigger();
        for worker in workers {
            worker.join().unwrap();
        }
    }
}
