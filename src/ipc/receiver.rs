use super::{Endpoint, EndpointRegistry, EndpointStats, Envelope};
use crate::coordination::Coordination;
use crate::defaults;
use crate::error::TransportError;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Receiving side of an endpoint
#[derive(Debug)]
pub struct ReceiveQueue {
    address: String,
    own_socket: bool,
    high_water: usize,
    endpoint: Option<Arc<Endpoint>>,
    rx: Option<Receiver<Envelope>>,
}

impl ReceiveQueue {
    pub fn connect(address: &str) -> Self {
        Self {
            address: address.to_string(),
            own_socket: false,
            high_water: defaults::HIGH_WATER_MARK,
            endpoint: None,
            rx: None,
        }
    }

    /// Whether closing this queue removes the endpoint from the registry
    pub fn set_own_socket(&mut self, own_socket: bool) {
        self.own_socket = own_socket;
    }

    pub fn set_high_water(&mut self, high_water: usize) {
        self.high_water = high_water;
    }

    /// Resolve the address and claim its receiving end
    pub fn prepare_to_receive(&mut self) -> Result<(), TransportError> {
        let endpoint = EndpointRegistry::global().open(&self.address, self.high_water)?;
        let rx = endpoint
            .claim_receiver()
            .ok_or_else(|| TransportError::AddressInUse(self.address.clone()))?;
        self.endpoint = Some(endpoint);
        self.rx = Some(rx);
        Ok(())
    }

    /// Wait up to `timeout` for the next message
    ///
    /// `None` on timeout, or when the queue was never prepared.
    pub fn receive(&self, timeout: Duration) -> Option<Envelope> {
        let rx = self.rx.as_ref()?;
        match rx.recv_timeout(timeout) {
            Ok(envelope) => Some(envelope),
            Err(RecvTimeoutError::Timeout) => None,
            // the endpoint keeps a sender alive for as long as we hold it
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn stats(&self) -> Option<EndpointStats> {
        self.endpoint.as_ref().map(|endpoint| endpoint.stats())
    }

    /// Release the receiving end; idempotent
    ///
    /// Messages still queued are dropped once the last sender lets go of the
    /// endpoint.
    pub fn close(&mut self) {
        self.rx = None;
        if let Some(endpoint) = self.endpoint.take() {
            if self.own_socket {
                EndpointRegistry::global().unlink(&endpoint);
            }
            debug!("Closed receive queue on {}", self.address);
        }
    }
}

impl Drop for ReceiveQueue {
    fn drop(&mut self) {
        self.close();
    }
}

/// Idle-timeout policy of the drain loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainPolicy {
    /// Bounded wait of each receive attempt
    pub receive_timeout: Duration,
    /// Consecutive empty receives that end the loop
    pub max_idle_waits: usize,
    pub high_water: usize,
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self {
            receive_timeout: defaults::RECEIVE_TIMEOUT,
            max_idle_waits: defaults::MAX_IDLE_WAITS,
            high_water: defaults::HIGH_WATER_MARK,
        }
    }
}

/// Why the drain loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The queue could not be prepared; nothing was received
    SetupFailed,
    /// The coordinator cleared keep-running
    Shutdown,
    /// Too many consecutive receives timed out
    IdleLimit,
}

/// Result of one receiver run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainOutcome {
    pub received: usize,
    pub idle_waits: usize,
    pub stop: StopReason,
    /// Endpoint counters at the time the receiver closed
    pub endpoint: EndpointStats,
}

/// Receive and release messages on `address` until told to stop
///
/// Signals readiness through `coordination` as soon as the queue is
/// prepared, then loops: each received message is counted and dropped, each
/// timeout counts as an idle wait (reset by the next message). The loop ends
/// when keep-running is cleared or the idle limit is reached.
pub fn receive(address: &str, coordination: &Coordination, policy: &DrainPolicy) -> DrainOutcome {
    let mut queue = ReceiveQueue::connect(address);
    queue.set_own_socket(true);
    queue.set_high_water(policy.high_water);
    if let Err(e) = queue.prepare_to_receive() {
        error!("Cannot start receiver on {}: {}", address, e);
        return DrainOutcome {
            received: 0,
            idle_waits: 0,
            stop: StopReason::SetupFailed,
            endpoint: EndpointStats::default(),
        };
    }

    coordination.mark_receiver_ready();
    debug!("Receiver ready on {}", address);

    let mut received = 0;
    let mut idle_waits = 0;
    let mut total_idle_waits = 0;
    while coordination.keep_running() && idle_waits < policy.max_idle_waits {
        match queue.receive(policy.receive_timeout) {
            Some(envelope) => {
                received += 1;
                idle_waits = 0;
                drop(envelope);
            }
            None => {
                idle_waits += 1;
                total_idle_waits += 1;
            }
        }
    }

    let stop = if coordination.keep_running() {
        StopReason::IdleLimit
    } else {
        StopReason::Shutdown
    };
    let endpoint = queue.stats().unwrap_or_default();
    queue.close();
    debug!(
        "Receiver on {} stopped ({:?}) after {} messages, {} idle waits",
        address, stop, received, total_idle_waits
    );

    DrainOutcome {
        received,
        idle_waits: total_idle_waits,
        stop,
        endpoint,
    }
}
