//! # Queue Transport
//!
//! A minimal producer/consumer transport living inside the process. Endpoints
//! are addressed like sockets (`ipc:///tmp/name.ipc` or `inproc://name`) and
//! looked up in a process-wide [`EndpointRegistry`]. Each endpoint is a
//! bounded channel whose capacity is its high-water mark.
//!
//! ## Ownership
//!
//! A queued [`Envelope`] has exactly one owner at any time: the sender until
//! it is handed to the channel, the channel until it is received, and the
//! receiver until it is dropped. Envelopes still queued when the endpoint
//! goes away are dropped with the channel.
//!
//! ## Overload
//!
//! Sends never block. A send that finds the channel at its high-water mark,
//! or finds the receiver gone, drops the message and counts it in the
//! endpoint's statistics.
//!
//! ## Late senders
//!
//! A receiver that owns its endpoint unlinks it on close. A sender that
//! activates after that opens a fresh endpoint with nobody attached: its
//! messages are accepted up to the high-water mark and stay queued until the
//! process exits, and its counters are not part of the closed receiver's
//! drain outcome.

use crate::error::TransportError;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

pub mod receiver;
pub mod sender;

pub use receiver::{receive, DrainOutcome, DrainPolicy, ReceiveQueue, StopReason};
pub use sender::{send, SendQueue};

/// Address schemes an endpoint may use
const SCHEMES: [&str; 2] = ["ipc://", "inproc://"];

/// One queued message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub slot: u32,
    pub payload: String,
}

/// Delivery counters of one endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStats {
    /// Messages accepted into the channel
    pub delivered: u64,
    /// Messages dropped at the high-water mark or after the receiver left
    pub dropped: u64,
}

/// A named bounded channel shared by senders and at most one receiver
#[derive(Debug)]
pub struct Endpoint {
    address: String,
    high_water: usize,
    tx: Sender<Envelope>,
    rx: Mutex<Option<Receiver<Envelope>>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Endpoint {
    fn new(address: &str, high_water: usize) -> Self {
        // a zero capacity would turn the queue into a rendezvous channel
        let (tx, rx) = channel::bounded(high_water.max(1));
        Self {
            address: address.to_string(),
            high_water: high_water.max(1),
            tx,
            rx: Mutex::new(Some(rx)),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Messages queued and not yet received
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    pub fn stats(&self) -> EndpointStats {
        EndpointStats {
            delivered: self.delivered.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
        }
    }

    /// Whether a receive queue has ever claimed this endpoint
    pub fn is_claimed(&self) -> bool {
        self.rx.lock().is_none()
    }

    /// Take the receiving end; only the first caller gets it
    fn claim_receiver(&self) -> Option<Receiver<Envelope>> {
        self.rx.lock().take()
    }

    /// Hand ownership of an envelope to the channel without blocking
    fn push(&self, envelope: Envelope) -> Result<(), TransportError> {
        match self.tx.try_send(envelope) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(TransportError::HighWaterMark {
                    endpoint: self.address.clone(),
                    high_water: self.high_water,
                })
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(TransportError::Disconnected(self.address.clone()))
            }
        }
    }
}

/// Process-wide table of live endpoints, keyed by address
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: Mutex<HashMap<String, Arc<Endpoint>>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry every send and receive queue resolves addresses in
    pub fn global() -> &'static EndpointRegistry {
        static REGISTRY: OnceLock<EndpointRegistry> = OnceLock::new();
        REGISTRY.get_or_init(EndpointRegistry::new)
    }

    /// Look up an endpoint, creating it with `high_water` if absent
    ///
    /// Whichever side opens an address first decides its high-water mark.
    pub fn open(&self, address: &str, high_water: usize) -> Result<Arc<Endpoint>, TransportError> {
        validate_address(address)?;
        let mut endpoints = self.endpoints.lock();
        let endpoint = endpoints
            .entry(address.to_string())
            .or_insert_with(|| {
                debug!("Creating endpoint {} (high-water mark {})", address, high_water);
                Arc::new(Endpoint::new(address, high_water))
            })
            .clone();
        Ok(endpoint)
    }

    pub fn lookup(&self, address: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.lock().get(address).cloned()
    }

    /// Remove `endpoint` if it is still the one registered under its address
    pub fn unlink(&self, endpoint: &Arc<Endpoint>) -> bool {
        let mut endpoints = self.endpoints.lock();
        match endpoints.get(endpoint.address()) {
            Some(current) if Arc::ptr_eq(current, endpoint) => {
                endpoints.remove(endpoint.address());
                debug!("Unlinked endpoint {}", endpoint.address());
                true
            }
            _ => false,
        }
    }
}

fn validate_address(address: &str) -> Result<(), TransportError> {
    let valid = SCHEMES
        .iter()
        .any(|scheme| address.strip_prefix(scheme).map_or(false, |rest| !rest.is_empty()));
    if valid {
        Ok(())
    } else {
        Err(TransportError::InvalidEndpoint(address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("ipc:///tmp/nanologtest.ipc").is_ok());
        assert!(validate_address("inproc://bench").is_ok());
        assert!(validate_address("ipc://").is_err());
        assert!(validate_address("tcp://127.0.0.1:5555").is_err());
        assert!(validate_address("").is_err());
    }

    #[test]
    fn test_open_returns_the_same_endpoint() {
        let registry = EndpointRegistry::new();
        let a = registry.open("inproc://same", 8).unwrap();
        let b = registry.open("inproc://same", 16).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.high_water(), 8);
    }

    #[test]
    fn test_receiver_is_claimed_once() {
        let registry = EndpointRegistry::new();
        let endpoint = registry.open("inproc://claim", 8).unwrap();
        assert!(!endpoint.is_claimed());
        assert!(endpoint.claim_receiver().is_some());
        assert!(endpoint.is_claimed());
        assert!(endpoint.claim_receiver().is_none());
    }

    #[test]
    fn test_push_drops_past_high_water_mark() {
        let registry = EndpointRegistry::new();
        let endpoint = registry.open("inproc://hwm", 2).unwrap();
        for i in 0..2 {
            endpoint
                .push(Envelope { slot: 0, payload: i.to_string() })
                .unwrap();
        }
        let overflow = endpoint.push(Envelope { slot: 0, payload: "x".into() });
        assert!(matches!(overflow, Err(TransportError::HighWaterMark { high_water: 2, .. })));
        assert_eq!(endpoint.queued(), 2);
        assert_eq!(endpoint.stats(), EndpointStats { delivered: 2, dropped: 1 });
    }

    #[test]
    fn test_push_after_receiver_left_is_dropped() {
        let registry = EndpointRegistry::new();
        let endpoint = registry.open("inproc://gone", 4).unwrap();
        drop(endpoint.claim_receiver());
        let result = endpoint.push(Envelope { slot: 0, payload: "late".into() });
        assert_eq!(result, Err(TransportError::Disconnected("inproc://gone".into())));
        assert_eq!(endpoint.stats().dropped, 1);
    }

    #[test]
    fn test_unlink_only_removes_the_registered_endpoint() {
        let registry = EndpointRegistry::new();
        let old = registry.open("inproc://relink", 4).unwrap();
        assert!(registry.unlink(&old));
        let new = registry.open("inproc://relink", 4).unwrap();
        assert!(!registry.unlink(&old));
        assert!(registry.lookup("inproc://relink").is_some());
        assert!(registry.unlink(&new));
        assert!(registry.lookup("inproc://relink").is_none());
    }
}
