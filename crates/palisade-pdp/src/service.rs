//! Decision point wired to the network.

use crate::config::PdpConfig;
use palisade_authorization::AuthorizationController;
use palisade_core::{AccessControlMessage, MessageEgress, PhysicalClock, Result};
use palisade_transport::{
    spawn_worker, MessageEgressHandler, MessageIngressHandler, Shutdown,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Running decision point.
pub struct PdpService {
    controller: Arc<AuthorizationController>,
    shutdown: Shutdown,
    workers: Vec<JoinHandle<()>>,
    ingress_addr: SocketAddr,
}

impl PdpService {
    /// Load every rule, bind the message sockets and start serving.
    pub fn open(config: &PdpConfig, clock: Arc<dyn PhysicalClock>) -> Result<Self> {
        config.validate()?;
        let shutdown = Shutdown::new();

        let (egress_handler, egress) = MessageEgressHandler::bind(
            SocketAddr::new(config.bind, config.message_egress_port),
            config.message_ingress_port,
            &config.udp,
            shutdown.clone(),
        )?;
        let authentication = Arc::new(config.crypto.client(egress.clone())?);
        let controller = Arc::new(AuthorizationController::new(
            authentication.clone(),
            egress.clone(),
            clock,
        ));
        for rule in &config.static_decisions {
            controller.add_static_decision(rule.decision()?, rule.validity())?;
        }
        for policy in &config.policies {
            controller.add_policy(policy.clone());
        }

        let handler = controller.clone();
        let ingress_handler = MessageIngressHandler::bind(
            SocketAddr::new(config.bind, config.message_ingress_port),
            &config.udp,
            shutdown.clone(),
            Arc::new(move |message: AccessControlMessage| {
                if let Err(error) = handler.handle_request(&message) {
                    tracing::debug!(
                        kind = %message.kind(),
                        source = ?message.source(),
                        %error,
                        "request rejected"
                    );
                }
            }),
        )?;
        let ingress_addr = ingress_handler.local_addr()?;

        let mut service = Self {
            controller: controller.clone(),
            shutdown: shutdown.clone(),
            workers: Vec::with_capacity(3),
            ingress_addr,
        };
        let mut started = vec![ingress_handler.spawn(), egress_handler.spawn()];
        if !config.attribute_sources.is_empty() {
            let poller = AttributePoller {
                controller,
                egress,
                sources: config.attribute_sources.clone(),
                interval: config.attribute_interval(),
                poll: config.udp.poll_interval(),
                shutdown,
            };
            started.push(spawn_worker("attribute-poller", move || poller.run()));
        }
        for worker in started {
            match worker {
                Ok(handle) => service.workers.push(handle),
                Err(error) => {
                    service.close();
                    return Err(error);
                }
            }
        }

        if let Some(host) = config.authentication {
            authentication.request_key(host)?;
        }
        tracing::info!(
            %ingress_addr,
            algorithm = authentication.algorithm_identifier(),
            decisions = service.controller.decisions().len(),
            "decision point running"
        );
        Ok(service)
    }

    /// Decision logic behind the sockets.
    pub fn controller(&self) -> &Arc<AuthorizationController> {
        &self.controller
    }

    /// Address access requests are received on.
    pub fn ingress_addr(&self) -> SocketAddr {
        self.ingress_addr
    }

    /// Block until the service is closed from another thread.
    pub fn wait(&mut self) {
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::warn!("decision point worker panicked");
            }
        }
    }

    /// Handle that stops the service when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stop serving, stop every refresher and wait for the threads.
    pub fn close(&mut self) {
        self.shutdown.trigger();
        self.controller.shutdown();
        self.wait();
    }
}

impl Drop for PdpService {
    fn drop(&mut self) {
        self.close();
    }
}

/// Periodically asks attribute providers for what the policies read.
struct AttributePoller {
    controller: Arc<AuthorizationController>,
    egress: MessageEgress,
    sources: Vec<IpAddr>,
    interval: Duration,
    poll: Duration,
    shutdown: Shutdown,
}

impl AttributePoller {
    fn run(self) {
        let mut next = Instant::now();
        while !self.shutdown.is_triggered() {
            if Instant::now() >= next {
                self.request_all();
                next += self.interval;
            }
            thread::sleep(self.poll.min(next.saturating_duration_since(Instant::now())));
        }
    }

    fn request_all(&self) {
        for &source in &self.sources {
            match self.controller.attribute_request(source) {
                Ok(Some(request)) => self.egress.enqueue(request),
                Ok(None) => {}
                Err(error) => tracing::warn!(%source, %error, "attribute request not sent"),
            }
        }
    }
}
