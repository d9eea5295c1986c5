//! Thread wiring of an enforcement point.
//!
//! A [`NetworkBridge`] runs six loops:
//!
//! | loop             | source            | destination                          |
//! |------------------|-------------------|--------------------------------------|
//! | message ingress  | UDP, ingress port | [`AccessController`]                 |
//! | message egress   | message queue     | UDP, from the egress port            |
//! | secure ingress   | secure interface  | insecure egress (bypass) or controller |
//! | insecure ingress | insecure interface| secure egress (bypass), else dropped |
//! | secure egress    | frame queue       | secure interface                     |
//! | insecure egress  | frame queue       | insecure interface                   |
//!
//! Authorized traffic never crosses the insecure interface directly; it is
//! tunnelled to the next enforcement point as signed control-plane messages.

use crate::access_controller::AccessController;
use palisade_authentication::{CryptoConfig, RequestConfig};
use palisade_core::{AccessControlMessage, Frame, PalisadeError, PhysicalClock, Result};
use palisade_transport::{
    BypassPredicate, FrameEgressHandler, FrameHandler, FrameIngressHandler, FrameInterface,
    MessageEgressHandler, MessageIngressHandler, Shutdown, UdpOptions, MESSAGE_EGRESS_PORT,
    MESSAGE_INGRESS_PORT,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Resolved settings of a filtering bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Own address; message sockets bind to it
    pub scope: IpAddr,
    /// Decision point
    pub authority: IpAddr,
    /// Host whose key is requested at startup
    pub authentication: Option<IpAddr>,
    /// Port control messages are received on, here and at every peer
    pub message_ingress_port: u16,
    /// Port control messages are sent from
    pub message_egress_port: u16,
    /// Socket options
    pub udp: UdpOptions,
    /// Retry budget for access requests
    pub requests: RequestConfig,
    /// Signature scheme and pinned keys
    pub crypto: CryptoConfig,
    /// Frames that skip access control
    pub bypass: BypassPredicate,
}

impl BridgeConfig {
    /// Standard ports and settings for `scope`, served by `authority`.
    pub fn new(scope: IpAddr, authority: IpAddr) -> Self {
        Self {
            scope,
            authority,
            authentication: None,
            message_ingress_port: MESSAGE_INGRESS_PORT,
            message_egress_port: MESSAGE_EGRESS_PORT,
            udp: UdpOptions::default(),
            requests: RequestConfig::default(),
            crypto: CryptoConfig::default(),
            bypass: BypassPredicate::standard(),
        }
    }
}

fn join_all(workers: &mut Vec<JoinHandle<()>>) {
    for worker in workers.drain(..) {
        let name = worker.thread().name().map(str::to_string);
        if worker.join().is_err() {
            tracing::warn!(worker = ?name, "bridge worker panicked");
        }
    }
}

/// Filtering bridge between a secure and an insecure segment.
pub struct NetworkBridge {
    controller: Arc<AccessController>,
    shutdown: Shutdown,
    workers: Vec<JoinHandle<()>>,
}

impl NetworkBridge {
    /// Bind the message sockets and start every loop.
    pub fn open(
        config: BridgeConfig,
        secure: Arc<dyn FrameInterface>,
        insecure: Arc<dyn FrameInterface>,
        clock: Arc<dyn PhysicalClock>,
    ) -> Result<Self> {
        check_ports(&config)?;
        let shutdown = Shutdown::new();
        let poll = config.udp.poll_interval();

        let (message_egress_handler, message_egress) = MessageEgressHandler::bind(
            SocketAddr::new(config.scope, config.message_egress_port),
            config.message_ingress_port,
            &config.udp,
            shutdown.clone(),
        )?;
        let authentication = Arc::new(config.crypto.client(message_egress.clone())?);

        let (secure_egress_handler, secure_egress) =
            FrameEgressHandler::new("secure", secure.clone(), shutdown.clone(), poll);
        let (insecure_egress_handler, insecure_egress) =
            FrameEgressHandler::new("insecure", insecure.clone(), shutdown.clone(), poll);

        let controller = Arc::new(AccessController::new(
            authentication.clone(),
            config.authority,
            config.scope,
            config.requests,
            message_egress,
            secure_egress.clone(),
            clock,
        ));

        let handler = controller.clone();
        let message_ingress_handler = MessageIngressHandler::bind(
            SocketAddr::new(config.scope, config.message_ingress_port),
            &config.udp,
            shutdown.clone(),
            Arc::new(move |message: AccessControlMessage| {
                if let Err(error) = handler.handle_incoming_message(&message) {
                    tracing::debug!(
                        kind = %message.kind(),
                        source = ?message.source(),
                        %error,
                        "message rejected"
                    );
                }
            }),
        )?;

        let outgoing = controller.clone();
        let bypass = config.bypass.clone();
        let secure_handler: FrameHandler = Arc::new(move |frame: Frame| {
            if bypass.matches(&frame) {
                insecure_egress.enqueue(frame);
            } else if let Err(error) = outgoing.handle_outgoing_frame(&frame) {
                tracing::debug!(%error, "outgoing frame dropped");
            }
        });

        let bypass = config.bypass;
        let insecure_handler: FrameHandler = Arc::new(move |frame: Frame| {
            if bypass.matches(&frame) {
                secure_egress.enqueue(frame);
            } else {
                tracing::trace!(length = frame.len(), "insecure frame dropped");
            }
        });

        let mut bridge = Self {
            controller,
            shutdown: shutdown.clone(),
            workers: Vec::with_capacity(6),
        };
        let started = [
            message_ingress_handler.spawn(),
            message_egress_handler.spawn(),
            FrameIngressHandler::new("secure", secure, secure_handler, shutdown.clone(), poll)
                .spawn(),
            FrameIngressHandler::new("insecure", insecure, insecure_handler, shutdown, poll)
                .spawn(),
            secure_egress_handler.spawn(),
            insecure_egress_handler.spawn(),
        ];
        for worker in started {
            match worker {
                Ok(handle) => bridge.workers.push(handle),
                Err(error) => {
                    bridge.close();
                    return Err(error);
                }
            }
        }

        if let Some(host) = config.authentication {
            authentication.request_key(host)?;
        }
        tracing::info!(
            scope = %config.scope,
            authority = %config.authority,
            algorithm = authentication.algorithm_identifier(),
            "enforcement point running"
        );
        Ok(bridge)
    }

    /// Enforcement logic shared by the loops.
    pub fn controller(&self) -> &Arc<AccessController> {
        &self.controller
    }

    /// Block until the bridge is closed from another thread or every loop
    /// has ended.
    pub fn wait(&mut self) {
        join_all(&mut self.workers);
    }

    /// Handle that stops the bridge when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stop every loop, cancel blocked requests and wait for the threads.
    pub fn close(&mut self) {
        self.shutdown.trigger();
        self.controller.close();
        join_all(&mut self.workers);
    }
}

impl Drop for NetworkBridge {
    fn drop(&mut self) {
        self.close();
    }
}

/// Unfiltered bridge: every frame is copied to the other side.
pub struct ForwardingBridge {
    shutdown: Shutdown,
    workers: Vec<JoinHandle<()>>,
}

impl ForwardingBridge {
    /// Start forwarding in both directions.
    pub fn open(
        secure: Arc<dyn FrameInterface>,
        insecure: Arc<dyn FrameInterface>,
        poll: Duration,
    ) -> Result<Self> {
        let shutdown = Shutdown::new();
        let mut bridge = Self {
            shutdown: shutdown.clone(),
            workers: Vec::with_capacity(2),
        };
        let directions = [
            ("secure", secure.clone(), insecure.clone()),
            ("insecure", insecure, secure),
        ];
        for (name, from, to) in directions {
            let handler: FrameHandler = Arc::new(move |frame: Frame| {
                if let Err(error) = to.send(&frame) {
                    tracing::warn!(from = name, %error, "frame not forwarded");
                }
            });
            let started =
                FrameIngressHandler::new(name, from, handler, shutdown.clone(), poll).spawn();
            match started {
                Ok(handle) => bridge.workers.push(handle),
                Err(error) => {
                    bridge.close();
                    return Err(error);
                }
            }
        }
        tracing::info!("forwarding without access control");
        Ok(bridge)
    }

    /// Block until the bridge is closed from another thread.
    pub fn wait(&mut self) {
        join_all(&mut self.workers);
    }

    /// Handle that stops the bridge when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stop forwarding and wait for the threads.
    pub fn close(&mut self) {
        self.shutdown.trigger();
        join_all(&mut self.workers);
    }
}

impl Drop for ForwardingBridge {
    fn drop(&mut self) {
        self.close();
    }
}

fn check_ports(config: &BridgeConfig) -> Result<()> {
    if config.message_ingress_port != 0 && config.message_ingress_port == config.message_egress_port
    {
        return Err(PalisadeError::invalid(format!(
            "message ingress and egress both use port {}",
            config.message_ingress_port
        )));
    }
    Ok(())
}
