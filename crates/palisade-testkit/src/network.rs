//! In-memory control-plane network.

use palisade_core::{AccessControlMessage, EgressQueue, MessageEgress};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Handler = Arc<dyn Fn(AccessControlMessage) + Send + Sync>;

/// Egress that keeps every item for later inspection.
pub struct RecordingEgress<T> {
    items: Mutex<Vec<T>>,
    arrived: Condvar,
}

impl<T: Clone> RecordingEgress<T> {
    /// Empty recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(Vec::new()),
            arrived: Condvar::new(),
        })
    }

    /// Items recorded so far.
    pub fn items(&self) -> Vec<T> {
        self.items.lock().clone()
    }

    /// Number of items recorded so far.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Block until at least `count` items were recorded or `timeout` passed.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        while items.len() < count {
            if self.arrived.wait_until(&mut items, deadline).timed_out() {
                return items.len() >= count;
            }
        }
        true
    }
}

impl<T: Clone + Send> EgressQueue<T> for RecordingEgress<T> {
    fn enqueue(&self, item: T) {
        self.items.lock().push(item);
        self.arrived.notify_all();
    }
}

#[derive(Default)]
struct Inner {
    handlers: RwLock<HashMap<IpAddr, Handler>>,
    delivered: Mutex<Vec<AccessControlMessage>>,
}

/// Routes messages between attached nodes.
///
/// Each message is stamped with its sender's address and handed to the
/// destination's handler on a fresh thread, like a datagram arriving on the
/// message ingress. Messages to unattached addresses are lost.
#[derive(Clone, Default)]
pub struct TestNetwork {
    inner: Arc<Inner>,
}

impl TestNetwork {
    /// Empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Egress queue for the node at `address`.
    pub fn egress(&self, address: IpAddr) -> MessageEgress {
        Arc::new(NodeEgress {
            address,
            inner: self.inner.clone(),
        })
    }

    /// Deliver messages addressed to `address` to `handler`.
    pub fn attach(
        &self,
        address: IpAddr,
        handler: impl Fn(AccessControlMessage) + Send + Sync + 'static,
    ) {
        self.inner
            .handlers
            .write()
            .insert(address, Arc::new(handler));
    }

    /// Stop delivering to `address`.
    pub fn detach(&self, address: IpAddr) {
        self.inner.handlers.write().remove(&address);
    }

    /// Every message sent so far, stamped with its source.
    pub fn sent(&self) -> Vec<AccessControlMessage> {
        self.inner.delivered.lock().clone()
    }

    /// Number of sent messages matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&AccessControlMessage) -> bool) -> usize {
        self.inner
            .delivered
            .lock()
            .iter()
            .filter(|message| predicate(message))
            .count()
    }
}

struct NodeEgress {
    address: IpAddr,
    inner: Arc<Inner>,
}

impl EgressQueue<AccessControlMessage> for NodeEgress {
    fn enqueue(&self, message: AccessControlMessage) {
        let message = message.from_source(self.address);
        self.inner.delivered.lock().push(message.clone());

        let handler = self
            .inner
            .handlers
            .read()
            .get(&message.destination())
            .cloned();
        match handler {
            Some(handler) => {
                thread::spawn(move || handler(message));
            }
            None => tracing::debug!(destination = %message.destination(), "no node attached"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{PDP, PEP_BLUE};

    #[test]
    fn test_messages_are_stamped_and_delivered() {
        let network = TestNetwork::new();
        let received = RecordingEgress::new();
        let sink = received.clone();
        network.attach(PDP, move |message| sink.enqueue(message));

        let egress = network.egress(PEP_BLUE);
        egress.enqueue(AccessControlMessage::key_exchange_request(PDP, "Ed25519"));
        assert!(received.wait_for(1, Duration::from_secs(2)));
        assert_eq!(received.items()[0].source(), Some(PEP_BLUE));
        assert_eq!(network.sent().len(), 1);
    }

    #[test]
    fn test_unattached_destination_loses_message() {
        let network = TestNetwork::new();
        network
            .egress(PEP_BLUE)
            .enqueue(AccessControlMessage::key_exchange_request(PDP, "Ed25519"));
        assert_eq!(network.count(|m| m.destination() == PDP), 1);
    }
}
