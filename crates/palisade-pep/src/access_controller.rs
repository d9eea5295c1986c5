//! Enforcement logic between the frame loops and the control plane.

use palisade_authentication::{AuthenticationClient, RequestConfig};
use palisade_authorization::AuthorizationManager;
use palisade_core::{
    AccessControlMessage, Frame, FrameEgress, MessageEgress, MessagePayload, PalisadeError,
    PhysicalClock, Result,
};
use std::net::IpAddr;
use std::sync::Arc;

/// Authorizes frames in both directions and routes control-plane messages.
pub struct AccessController {
    authentication: Arc<AuthenticationClient>,
    manager: AuthorizationManager,
    message_egress: MessageEgress,
    secure_egress: FrameEgress,
}

impl AccessController {
    /// Controller for the enforcement point at `scope`, served by `authority`.
    ///
    /// Signed messages go to `message_egress`; frames released into the
    /// secure segment go to `secure_egress`.
    pub fn new(
        authentication: Arc<AuthenticationClient>,
        authority: IpAddr,
        scope: IpAddr,
        requests: RequestConfig,
        message_egress: MessageEgress,
        secure_egress: FrameEgress,
        clock: Arc<dyn PhysicalClock>,
    ) -> Self {
        let manager = AuthorizationManager::new(
            authority,
            scope,
            authentication.clone(),
            message_egress.clone(),
            clock,
        )
        .with_request_config(requests);
        Self {
            authentication,
            manager,
            message_egress,
            secure_egress,
        }
    }

    /// Tunnel a frame captured on the secure side, if a grant allows it.
    ///
    /// Blocks while the decision point is consulted.
    pub fn handle_outgoing_frame(&self, frame: &Frame) -> Result<()> {
        let message = self.manager.authorize_outgoing(frame)?;
        let message = self.authentication.sign_message(&message)?;
        tracing::trace!(next_hop = %message.destination(), "frame tunnelled");
        self.message_egress.enqueue(message);
        Ok(())
    }

    /// Dispatch one received control-plane message.
    ///
    /// Tunnelled frames are released into the secure segment only when their
    /// signature checks and an incoming grant covers them.
    pub fn handle_incoming_message(&self, message: &AccessControlMessage) -> Result<()> {
        match message.payload() {
            MessagePayload::PayloadExchange(_) => {
                if !self.authentication.verify_message(message) {
                    return Err(PalisadeError::permission_denied(format!(
                        "payload from {:?} failed verification",
                        message.source()
                    )));
                }
                let frame = self.manager.authorize_incoming(message)?;
                self.secure_egress.enqueue(frame);
                Ok(())
            }
            MessagePayload::KeyExchangeRequest(_) | MessagePayload::KeyExchange(_) => {
                self.authentication.handle_message(message);
                Ok(())
            }
            MessagePayload::AccessDecision(_) => self.manager.process_decision(message),
            _ => {
                tracing::debug!(
                    kind = %message.kind(),
                    source = ?message.source(),
                    "unexpected message"
                );
                Ok(())
            }
        }
    }

    /// Signing and key exchange for this node.
    pub fn authentication(&self) -> &Arc<AuthenticationClient> {
        &self.authentication
    }

    /// Decision cache.
    pub fn manager(&self) -> &AuthorizationManager {
        &self.manager
    }

    /// Cancel every blocked authorization and key request.
    pub fn close(&self) {
        self.manager.close();
        self.authentication.close();
    }
}
