//! Non-blocking outbound queues.
//!
//! Components never talk to sockets or capture handles directly; they offer
//! messages and frames to an [`EgressQueue`] drained by a transport thread.

use crate::frame::Frame;
use crate::message::AccessControlMessage;
use std::sync::mpsc;
use std::sync::Arc;

/// Best-effort, non-blocking outbound queue.
pub trait EgressQueue<T>: Send + Sync {
    /// Queue `item` for transmission. Items offered after the consumer has
    /// gone away are dropped.
    fn enqueue(&self, item: T);
}

/// Shared queue of outbound control-plane messages.
pub type MessageEgress = Arc<dyn EgressQueue<AccessControlMessage>>;

/// Shared queue of outbound frames.
pub type FrameEgress = Arc<dyn EgressQueue<Frame>>;

impl<T: Send> EgressQueue<T> for mpsc::Sender<T> {
    fn enqueue(&self, item: T) {
        if self.send(item).is_err() {
            tracing::debug!("egress consumer closed, dropping item");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_queue() {
        let (tx, rx) = mpsc::channel::<u8>();
        let queue: Arc<dyn EgressQueue<u8>> = Arc::new(tx);
        queue.enqueue(7);
        assert_eq!(rx.recv().unwrap(), 7);

        drop(rx);
        queue.enqueue(8);
    }
}
