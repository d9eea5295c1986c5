//! Decision point logic.
//!
//! The controller answers access requests from its sorted decision store.
//! Decisions come from two sources: static decisions, kept valid by a
//! [`DecisionRefresher`] thread each, and attribute-based policies that are
//! re-evaluated whenever new attributes arrive.

use crate::policy::{AccessPolicy, FALLBACK_DENY_VALIDITY};
use crate::store::DecisionStore;
use palisade_authentication::AuthenticationClient;
use palisade_core::{
    AccessControlMessage, AccessDecision, AccessRequestPattern, AttributeId, AttributeSet,
    MessageEgress, MessagePayload, PalisadeError, PhysicalClock, PolicyAttribute, Result,
};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Remaining validity below which a static decision is renewed.
pub const REFRESH_THRESHOLD: Duration = Duration::from_millis(50);

/// Margin subtracted from the remaining validity before sleeping.
pub const SLEEP_OFFSET: Duration = Duration::from_millis(30);

/// Validity given to static decisions on every renewal.
pub const STATIC_DECISION_VALIDITY: Duration = Duration::from_secs(15);

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Background renewal of one static decision.
///
/// Sleeps until the decision is about to expire, then replaces it with a copy
/// valid for another `validity`. Stopped and joined on drop.
pub struct DecisionRefresher {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl DecisionRefresher {
    /// Start refreshing `decision` inside `store`.
    pub fn spawn(
        decision: AccessDecision,
        validity: Duration,
        store: Arc<DecisionStore>,
        clock: Arc<dyn PhysicalClock>,
    ) -> Result<Self> {
        if validity <= REFRESH_THRESHOLD {
            return Err(PalisadeError::invalid(format!(
                "refresh validity {validity:?} must exceed {REFRESH_THRESHOLD:?}"
            )));
        }
        let signal = Arc::new(StopSignal::default());
        let thread_signal = signal.clone();
        let handle = thread::Builder::new()
            .name("decision-refresher".to_string())
            .spawn(move || {
                refresh_loop(decision, validity, &store, clock.as_ref(), &thread_signal)
            })
            .map_err(|e| PalisadeError::internal(format!("cannot start refresher: {e}")))?;
        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it.
    pub fn stop(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("decision refresher panicked");
            }
        }
    }
}

impl Drop for DecisionRefresher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn refresh_loop(
    mut decision: AccessDecision,
    validity: Duration,
    store: &DecisionStore,
    clock: &dyn PhysicalClock,
    signal: &StopSignal,
) {
    tracing::debug!(%decision, "refresher started");
    let mut stopped = signal.stopped.lock();
    while !*stopped {
        let now = clock.now();
        let left = decision.valid_until().duration_since(now);
        if left < REFRESH_THRESHOLD {
            let renewed = decision.renewed(now.saturating_add(validity));
            store.replace(Some(&decision), renewed.clone());
            decision = renewed;
            continue;
        }
        signal.wake.wait_for(&mut stopped, left - SLEEP_OFFSET);
    }
    tracing::debug!(pattern = %decision.pattern(), "refresher stopped");
}

/// A registered policy and the decision it last produced.
struct PolicyEntry {
    policy: AccessPolicy,
    current: AccessDecision,
}

/// Decision point.
pub struct AuthorizationController {
    authentication: Arc<AuthenticationClient>,
    egress: MessageEgress,
    clock: Arc<dyn PhysicalClock>,
    decisions: Arc<DecisionStore>,
    policies: RwLock<Vec<PolicyEntry>>,
    attributes: RwLock<AttributeSet>,
    refreshers: Mutex<Vec<DecisionRefresher>>,
}

impl AuthorizationController {
    /// Controller with an empty decision store.
    pub fn new(
        authentication: Arc<AuthenticationClient>,
        egress: MessageEgress,
        clock: Arc<dyn PhysicalClock>,
    ) -> Self {
        Self {
            authentication,
            egress,
            clock,
            decisions: Arc::new(DecisionStore::new()),
            policies: RwLock::new(Vec::new()),
            attributes: RwLock::new(AttributeSet::new()),
            refreshers: Mutex::new(Vec::new()),
        }
    }

    /// Authentication client used for requests and replies.
    pub fn authentication(&self) -> &Arc<AuthenticationClient> {
        &self.authentication
    }

    /// Store `decision` and keep it valid, renewing for `validity` each time.
    pub fn add_static_decision(&self, decision: AccessDecision, validity: Duration) -> Result<()> {
        let decision = decision.renewed(self.clock.now().saturating_add(validity));
        tracing::info!(%decision, "static decision");
        self.decisions.add(decision.clone());
        let refresher = DecisionRefresher::spawn(
            decision,
            validity,
            self.decisions.clone(),
            self.clock.clone(),
        )?;
        self.refreshers.lock().push(refresher);
        Ok(())
    }

    /// Store a one-off decision; it expires normally.
    pub fn add_decision(&self, decision: AccessDecision) {
        self.decisions.add(decision);
    }

    /// Register `policy` and evaluate it against the current attributes.
    pub fn add_policy(&self, policy: AccessPolicy) {
        let decision = policy.evaluate(&self.attributes.read(), self.clock.now());
        tracing::info!(predicate = %policy.predicate(), %decision, "policy added");
        self.decisions.add(decision.clone());
        self.policies.write().push(PolicyEntry {
            policy,
            current: decision,
        });
    }

    /// Merge `attributes` into the attribute store and re-evaluate policies.
    pub fn update_attributes(&self, attributes: impl IntoIterator<Item = PolicyAttribute>) {
        {
            let mut current = self.attributes.write();
            current.extend(attributes);
            current.retain_valid(self.clock.now());
        }
        self.evaluate_policies();
    }

    /// Turn every policy into a decision for the current attributes.
    pub fn evaluate_policies(&self) {
        let now = self.clock.now();
        let attributes = self.attributes.read();
        for entry in self.policies.write().iter_mut() {
            let decision = entry.policy.evaluate(&attributes, now);
            tracing::debug!(%decision, "policy evaluated");
            self.decisions.replace(Some(&entry.current), decision.clone());
            entry.current = decision;
        }
    }

    /// Attribute identifiers every registered policy reads.
    pub fn required_attributes(&self) -> BTreeSet<AttributeId> {
        self.policies
            .read()
            .iter()
            .flat_map(|entry| entry.policy.predicate().required_attribute_identifiers())
            .collect()
    }

    /// Signed request for the attributes the policies need, if any.
    pub fn attribute_request(&self, destination: IpAddr) -> Result<Option<AccessControlMessage>> {
        let identifiers: Vec<_> = self.required_attributes().into_iter().collect();
        if identifiers.is_empty() {
            return Ok(None);
        }
        let request = AccessControlMessage::new(
            destination,
            MessagePayload::AttributeExchangeRequest(identifiers),
        );
        self.authentication.sign_message(&request).map(Some)
    }

    /// Decision for `pattern`: the most specific valid match, or a DENY for
    /// the pattern itself when nothing matches.
    pub fn decide(&self, pattern: &AccessRequestPattern) -> AccessDecision {
        let now = self.clock.now();
        self.decisions
            .first_match(pattern, now, |_| true)
            .unwrap_or_else(|| {
                AccessDecision::deny(pattern.clone(), now.saturating_add(FALLBACK_DENY_VALIDITY))
            })
    }

    /// Current decisions in specificity order.
    pub fn decisions(&self) -> Vec<AccessDecision> {
        self.decisions.snapshot()
    }

    /// Handle one received control-plane message.
    pub fn handle_request(&self, message: &AccessControlMessage) -> Result<()> {
        match message.payload() {
            MessagePayload::KeyExchangeRequest(_) | MessagePayload::KeyExchange(_) => {
                self.authentication.handle_message(message);
                Ok(())
            }
            MessagePayload::AccessRequest(pattern) => self.process_access_request(message, pattern),
            MessagePayload::AttributeExchange(attributes) => {
                if !self.authentication.verify_message(message) {
                    return Err(PalisadeError::permission_denied(
                        "attribute exchange failed verification",
                    ));
                }
                tracing::info!(
                    source = ?message.source(),
                    count = attributes.len(),
                    "attributes received"
                );
                self.update_attributes(attributes.iter().cloned());
                Ok(())
            }
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

    /// Stop every refresher.
    pub fn shutdown(&self) {
        for mut refresher in self.refreshers.lock().drain(..) {
            refresher.stop();
        }
        self.authentication.close();
    }

    fn process_access_request(
        &self,
        message: &AccessControlMessage,
        pattern: &AccessRequestPattern,
    ) -> Result<()> {
        let requester = message
            .source()
            .ok_or_else(|| PalisadeError::invalid("access request without source"))?;
        if !self.authentication.verify_message(message) {
            return Err(PalisadeError::permission_denied(format!(
                "access request from {requester} failed verification"
            )));
        }

        let decision = self.decide(pattern);
        if decision.is_granting() {
            if let Some(next_hop) = decision.next_hop() {
                self.send_decision(next_hop, &decision)?;
            }
        }
        self.send_decision(requester, &decision)?;
        tracing::info!(%requester, %decision, "access request answered");
        Ok(())
    }

    fn send_decision(&self, destination: IpAddr, decision: &AccessDecision) -> Result<()> {
        let message = AccessControlMessage::access_decision(destination, decision.clone());
        let signed = self.authentication.sign_message(&message)?;
        self.egress.enqueue(signed);
        Ok(())
    }
}
