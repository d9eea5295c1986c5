//! Blocking cache entries that are fetched from a remote host on demand.
//!
//! A [`RequestableResource`] starts out unavailable. The first caller of
//! [`RequestableResource::get`] sends a request through the message egress and
//! waits; whoever receives the answer calls [`RequestableResource::set`], which
//! wakes every waiter. A request is considered in flight for one timeout
//! period, so concurrent callers share it instead of sending their own.

use palisade_core::{AccessControlMessage, MessageEgress, PalisadeError, Result};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Number of re-requests before giving up.
pub const DEFAULT_RETRIES: u32 = 3;

/// Wait per attempt, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 250;

/// Retry budget shared by every resource of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Re-requests after the first attempt
    pub retries: u32,
    /// Wait per attempt in milliseconds
    pub timeout_ms: u64,
}

impl RequestConfig {
    /// Wait per attempt.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Builds the signed request that asks a remote host for the resource.
pub trait RequestBuilder: Send + Sync {
    /// Request message, ready for the egress.
    fn build_request(&self) -> Result<AccessControlMessage>;
}

struct State<V> {
    value: Option<V>,
    last_request: Option<Instant>,
    closed: bool,
}

/// Value that becomes available once a remote host answers a request.
pub struct RequestableResource<V> {
    config: RequestConfig,
    builder: Box<dyn RequestBuilder>,
    egress: MessageEgress,
    state: Mutex<State<V>>,
    available: Condvar,
}

impl<V: Clone> RequestableResource<V> {
    /// Unavailable resource requested through `builder`.
    pub fn new(
        config: RequestConfig,
        builder: Box<dyn RequestBuilder>,
        egress: MessageEgress,
    ) -> Self {
        Self {
            config,
            builder,
            egress,
            state: Mutex::new(State {
                value: None,
                last_request: None,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Return the value, requesting it and blocking until it arrives.
    ///
    /// Blocks for at most `(retries + 1) * timeout`. Fails with
    /// [`PalisadeError::Timeout`] when no answer arrived in that time and with
    /// [`PalisadeError::Cancelled`] once the resource is closed.
    pub fn get(&self) -> Result<V> {
        let timeout = self.config.timeout();
        let mut state = self.state.lock();

        for _ in 0..=self.config.retries {
            if let Some(value) = &state.value {
                return Ok(value.clone());
            }
            if state.closed {
                return Err(PalisadeError::cancelled("resource closed while waiting"));
            }

            let in_flight = state
                .last_request
                .is_some_and(|sent| sent.elapsed() < timeout);
            if !in_flight {
                match self.builder.build_request() {
                    Ok(request) => {
                        tracing::debug!(%request, "requesting unavailable resource");
                        self.egress.enqueue(request);
                        state.last_request = Some(Instant::now());
                    }
                    Err(error) => tracing::warn!(%error, "failed to build resource request"),
                }
            }

            self.available.wait_for(&mut state, timeout);
        }

        match (&state.value, state.closed) {
            (Some(value), _) => Ok(value.clone()),
            (None, true) => Err(PalisadeError::cancelled("resource closed while waiting")),
            (None, false) => Err(PalisadeError::timeout(format!(
                "no answer after {} requests",
                self.config.retries + 1
            ))),
        }
    }

    /// Store `value` and wake every waiter.
    pub fn set(&self, value: V) {
        let mut state = self.state.lock();
        state.value = Some(value);
        self.available.notify_all();
    }

    /// Current value without requesting it.
    pub fn peek(&self) -> Option<V> {
        self.state.lock().value.clone()
    }

    /// Whether no value has been set yet.
    pub fn is_unavailable(&self) -> bool {
        self.state.lock().value.is_none()
    }

    /// Wake every waiter with a cancellation; later `get` calls without a
    /// value fail immediately.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.available.notify_all();
    }
}
