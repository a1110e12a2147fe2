//! # Handshake and Shutdown Coordination
//!
//! The queue scenario has one background receiver and a coordinator that
//! drives the thread-count sweep. They share exactly two flags:
//!
//! - **wait-to-start**: `true` until the receiver has prepared its queue
//! - **keep-running**: `true` until the coordinator has finished sending
//!
//! ```text
//! NOT_STARTED ──receiver ready──► RECEIVER_READY ──► SENDING
//!      │                                               │
//!      └──20 polls, degraded──────────────────────────►│
//!                                                      ▼
//!                                 DONE ◄── DRAINING (keep-running = false)
//! ```
//!
//! Both flags use sequentially consistent atomics so no extra locking is
//! needed to observe them across the receiver task and the coordinator.

use crate::defaults;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Shared coordination state of one queue scenario run
///
/// Held behind an `Arc` by both the coordinator and the receiver task.
#[derive(Debug)]
pub struct Coordination {
    wait_to_start: AtomicBool,
    keep_running: AtomicBool,
}

impl Default for Coordination {
    fn default() -> Self {
        Self {
            wait_to_start: AtomicBool::new(true),
            keep_running: AtomicBool::new(true),
        }
    }
}

impl Coordination {
    pub fn new() -> Self {
        Self::default()
    }

    /// True until the receiver signals that its queue is ready
    pub fn is_waiting_to_start(&self) -> bool {
        self.wait_to_start.load(Ordering::SeqCst)
    }

    /// Called once by the receiver right after preparing its queue
    pub fn mark_receiver_ready(&self) {
        self.wait_to_start.store(false, Ordering::SeqCst);
    }

    pub fn keep_running(&self) -> bool {
        self.keep_running.load(Ordering::SeqCst)
    }

    /// Ask the receiver to leave its drain loop
    pub fn request_shutdown(&self) {
        self.keep_running.store(false, Ordering::SeqCst);
    }

    /// Poll the start signal until the receiver is ready
    ///
    /// Returns `false` if the receiver never signalled within the policy's
    /// poll budget. Callers proceed anyway in that case.
    pub async fn wait_for_receiver(&self, policy: &HandshakePolicy) -> bool {
        let mut polls = 0;
        while self.is_waiting_to_start() && polls < policy.max_polls {
            polls += 1;
            sleep(policy.poll_interval).await;
        }
        let ready = !self.is_waiting_to_start();
        debug!("Receiver handshake after {} polls: ready={}", polls, ready);
        ready
    }
}

/// How long the coordinator waits for the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakePolicy {
    pub poll_interval: Duration,
    pub max_polls: usize,
}

impl Default for HandshakePolicy {
    fn default() -> Self {
        Self {
            poll_interval: defaults::START_POLL_INTERVAL,
            max_polls: defaults::MAX_START_POLLS,
        }
    }
}

/// Progress of a queue scenario run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandshakeState {
    NotStarted,
    ReceiverReady,
    Sending,
    Draining,
    Done,
}

impl std::fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandshakeState::NotStarted => write!(f, "NOT_STARTED"),
            HandshakeState::ReceiverReady => write!(f, "RECEIVER_READY"),
            HandshakeState::Sending => write!(f, "SENDING"),
            HandshakeState::Draining => write!(f, "DRAINING"),
            HandshakeState::Done => write!(f, "DONE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_initial_flags() {
        let coordination = Coordination::new();
        assert!(coordination.is_waiting_to_start());
        assert!(coordination.keep_running());

        coordination.mark_receiver_ready();
        coordination.request_shutdown();
        assert!(!coordination.is_waiting_to_start());
        assert!(!coordination.keep_running());
    }

    #[tokio::test]
    async fn test_wait_returns_once_receiver_is_ready() {
        let coordination = Arc::new(Coordination::new());
        let receiver_side = coordination.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            receiver_side.mark_receiver_ready();
        });

        let policy = HandshakePolicy {
            poll_interval: Duration::from_millis(10),
            max_polls: 200,
        };
        let started = Instant::now();
        assert!(coordination.wait_for_receiver(&policy).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_gives_up_after_poll_budget() {
        let coordination = Coordination::new();
        let policy = HandshakePolicy {
            poll_interval: Duration::from_millis(5),
            max_polls: 4,
        };
        let started = Instant::now();
        assert!(!coordination.wait_for_receiver(&policy).await);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_wait_is_immediate_when_already_ready() {
        let coordination = Coordination::new();
        coordination.mark_receiver_ready();
        let policy = HandshakePolicy {
            poll_interval: Duration::from_secs(10),
            max_polls: 20,
        };
        assert!(coordination.wait_for_receiver(&policy).await);
    }

    #[test]
    fn test_states_are_ordered() {
        assert!(HandshakeState::NotStarted < HandshakeState::ReceiverReady);
        assert!(HandshakeState::Sending < HandshakeState::Draining);
        assert_eq!(HandshakeState::Done.to_string(), "DONE");
    }

    #[test]
    fn test_default_policy() {
        let policy = HandshakePolicy::default();
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
        assert_eq!(policy.max_polls, 20);
    }
}
