//! Decision cache of a policy enforcement point.
//!
//! Outgoing decisions say whether, and to which downstream enforcement point,
//! frames leaving the secure network may be tunnelled. Incoming decisions say
//! which tunnelled frames this node accepts. Decisions are only ever issued by
//! the authority, the decision point this node is configured with.
//!
//! A frame without a matching outgoing decision blocks its caller while the
//! authority is asked; concurrent frames of the same pattern share a single
//! request.

use crate::store::DecisionStore;
use palisade_authentication::{
    AuthenticationClient, RequestBuilder, RequestConfig, RequestableResource,
};
use palisade_core::{
    derive_pattern, AccessControlMessage, AccessDecision, AccessRequestPattern, Frame,
    MessageEgress, MessagePayload, PalisadeError, PhysicalClock, Result,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

type PendingDecision = Arc<RequestableResource<AccessDecision>>;

/// Asks the authority for a decision on one pattern.
struct AccessRequestBuilder {
    authority: IpAddr,
    pattern: AccessRequestPattern,
    authentication: Arc<AuthenticationClient>,
}

impl RequestBuilder for AccessRequestBuilder {
    fn build_request(&self) -> Result<AccessControlMessage> {
        let request = AccessControlMessage::access_request(self.authority, self.pattern.clone());
        self.authentication.sign_message(&request)
    }
}

/// Enforcement point view of access decisions.
pub struct AuthorizationManager {
    authority: IpAddr,
    scope: IpAddr,
    authentication: Arc<AuthenticationClient>,
    egress: MessageEgress,
    clock: Arc<dyn PhysicalClock>,
    config: RequestConfig,
    outgoing: DecisionStore,
    incoming: DecisionStore,
    pending: Mutex<HashMap<AccessRequestPattern, PendingDecision>>,
}

impl AuthorizationManager {
    /// Manager for the enforcement point at `scope`, served by `authority`.
    pub fn new(
        authority: IpAddr,
        scope: IpAddr,
        authentication: Arc<AuthenticationClient>,
        egress: MessageEgress,
        clock: Arc<dyn PhysicalClock>,
    ) -> Self {
        Self {
            authority,
            scope,
            authentication,
            egress,
            clock,
            config: RequestConfig::default(),
            outgoing: DecisionStore::new(),
            incoming: DecisionStore::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Use a different retry budget for access requests.
    pub fn with_request_config(mut self, config: RequestConfig) -> Self {
        self.config = config;
        self
    }

    /// Address of the decision point.
    pub fn authority(&self) -> IpAddr {
        self.authority
    }

    /// Address of this enforcement point.
    pub fn scope(&self) -> IpAddr {
        self.scope
    }

    /// Decide whether `frame` may leave the secure network.
    ///
    /// Returns the unsigned payload-exchange message addressed to the next hop
    /// on GRANT. Fails with [`PalisadeError::PermissionDenied`] on DENY and
    /// with [`PalisadeError::Timeout`] when the authority stays silent.
    pub fn authorize_outgoing(&self, frame: &Frame) -> Result<AccessControlMessage> {
        let pattern = derive_pattern(frame.as_bytes())?;
        let decision = match self.outgoing.first_match(&pattern, self.clock.now(), |_| true) {
            Some(decision) => decision,
            None => self.request_decision(pattern)?,
        };

        if !decision.is_granting() {
            return Err(PalisadeError::permission_denied(format!(
                "denied by {decision}"
            )));
        }
        let next_hop = decision.next_hop().ok_or_else(|| {
            PalisadeError::invalid(format!("grant without next hop: {decision}"))
        })?;
        Ok(AccessControlMessage::payload_exchange(next_hop, frame.clone()))
    }

    /// Accept the frame tunnelled in `message` if an incoming GRANT covers it.
    pub fn authorize_incoming(&self, message: &AccessControlMessage) -> Result<Frame> {
        let MessagePayload::PayloadExchange(frame) = message.payload() else {
            return Err(PalisadeError::invalid(format!(
                "expected payload exchange, got {}",
                message.kind()
            )));
        };
        let pattern = derive_pattern(frame.as_bytes())?;
        match self
            .incoming
            .first_match(&pattern, self.clock.now(), AccessDecision::is_granting)
        {
            Some(_) => Ok(frame.clone()),
            None => Err(PalisadeError::permission_denied(format!(
                "no incoming grant for {pattern}"
            ))),
        }
    }

    /// File a decision received from the authority.
    ///
    /// Decisions naming this node as next hop become incoming grants; all
    /// others become outgoing decisions and resolve waiting requests whose
    /// pattern contains them. Expired decisions are ignored.
    pub fn process_decision(&self, message: &AccessControlMessage) -> Result<()> {
        let MessagePayload::AccessDecision(decision) = message.payload() else {
            return Err(PalisadeError::invalid(format!(
                "expected access decision, got {}",
                message.kind()
            )));
        };
        if message.source() != Some(self.authority) {
            return Err(PalisadeError::permission_denied(format!(
                "decision from {:?}, authority is {}",
                message.source(),
                self.authority
            )));
        }
        if !self.authentication.verify_message(message) {
            return Err(PalisadeError::permission_denied(
                "decision failed verification",
            ));
        }

        let now = self.clock.now();
        if !decision.is_valid_at(now) {
            tracing::debug!(%decision, %now, "ignoring expired decision");
            return Ok(());
        }

        if decision.next_hop() == Some(self.scope) {
            if decision.is_granting() {
                tracing::debug!(%decision, "incoming grant");
                self.incoming.insert(decision.clone());
            }
        } else {
            tracing::debug!(%decision, "outgoing decision");
            self.outgoing.insert(decision.clone());
            self.resolve_pending(decision);
        }
        Ok(())
    }

    /// Cancel every waiting request.
    pub fn close(&self) {
        for pending in self.pending.lock().drain().map(|(_, pending)| pending) {
            pending.close();
        }
    }

    /// Current outgoing decisions.
    pub fn outgoing_decisions(&self) -> Vec<AccessDecision> {
        self.outgoing.snapshot()
    }

    /// Number of access requests still waiting for a decision.
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }

    /// Current incoming decisions.
    pub fn incoming_decisions(&self) -> Vec<AccessDecision> {
        self.incoming.snapshot()
    }

    fn request_decision(&self, pattern: AccessRequestPattern) -> Result<AccessDecision> {
        let pending = {
            let mut pending = self.pending.lock();
            // a decision filed since the first lookup has already resolved
            // and removed the entry we would otherwise join
            if let Some(decision) = self.outgoing.first_match(&pattern, self.clock.now(), |_| true)
            {
                return Ok(decision);
            }
            pending
                .entry(pattern.clone())
                .or_insert_with(|| {
                    let builder = AccessRequestBuilder {
                        authority: self.authority,
                        pattern: pattern.clone(),
                        authentication: self.authentication.clone(),
                    };
                    Arc::new(RequestableResource::new(
                        self.config,
                        Box::new(builder),
                        self.egress.clone(),
                    ))
                })
                .clone()
        };

        let outcome = pending.get();
        if outcome.is_err() {
            self.forget_pending(&pattern, &pending);
        }
        outcome.map_err(|error| match error {
            PalisadeError::Timeout { .. } => {
                PalisadeError::timeout(format!("authorization unavailable for {pattern}"))
            }
            other => other,
        })
    }

    /// Drop a timed-out or cancelled entry once its last waiter gives up.
    fn forget_pending(&self, pattern: &AccessRequestPattern, resource: &PendingDecision) {
        let mut pending = self.pending.lock();
        let abandoned = pending.get(pattern).is_some_and(|current| {
            // the map and `resource` hold the only references
            Arc::ptr_eq(current, resource)
                && current.is_unavailable()
                && Arc::strong_count(current) == 2
        });
        if abandoned {
            pending.remove(pattern);
        }
    }

    fn resolve_pending(&self, decision: &AccessDecision) {
        let mut pending = self.pending.lock();
        pending.retain(|pattern, resource| {
            if resource.is_unavailable() && pattern.contains(decision.pattern()) {
                resource.set(decision.clone());
                false
            } else {
                true
            }
        });
    }
}
