//! # Scenario Selector
//!
//! Dispatches one [`Scenario`] to its backend adapter and drives the
//! thread-count sweep. The queue scenario additionally runs the receiver in
//! the background and follows the handshake/shutdown protocol of
//! [`crate::coordination`].

use crate::backends::{self, QueueNado};
use crate::cli::Scenario;
use crate::coordination::{Coordination, HandshakePolicy, HandshakeState};
use crate::defaults;
use crate::ipc::{self, DrainOutcome, DrainPolicy};
use crate::metrics::LatencyRecorder;
use crate::runner::{BenchmarkRun, BenchmarkRunner};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fixed-policy parameters of a scenario run
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub iterations: usize,
    pub thread_counts: Vec<usize>,
    pub queue: QueueConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            iterations: defaults::ITERATIONS,
            thread_counts: defaults::THREAD_COUNTS.to_vec(),
            queue: QueueConfig::default(),
        }
    }
}

/// Queue scenario parameters
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub endpoint: String,
    pub drain: DrainPolicy,
    pub handshake: HandshakePolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::QUEUE_ENDPOINT.to_string(),
            drain: DrainPolicy::default(),
            handshake: HandshakePolicy::default(),
        }
    }
}

/// What the queue scenario observed besides latencies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueOutcome {
    /// Whether the receiver signalled readiness before sending began
    pub receiver_ready: bool,
    pub received: usize,
    /// Sends that never reached the transport because activation failed
    pub failed_sends: u64,
    pub drain: DrainOutcome,
    /// States visited, in order
    pub states: Vec<HandshakeState>,
}

/// Everything one scenario produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResults {
    pub scenario: Scenario,
    pub runs: Vec<BenchmarkRun>,
    pub queue: Option<QueueOutcome>,
}

/// Run `scenario` with the given policy
///
/// File-backed scenarios assume their log writer has already been installed
/// with [`crate::logging::init`]; without it their events are discarded.
pub async fn run_scenario(scenario: Scenario, config: &ScenarioConfig) -> Result<ScenarioResults> {
    info!("Running scenario {} ({} iterations per thread)", scenario, config.iterations);
    match scenario {
        Scenario::QueueNado => run_queue_scenario(config).await,
        _ => run_file_scenario(scenario, config).await,
    }
}

async fn run_file_scenario(scenario: Scenario, config: &ScenarioConfig) -> Result<ScenarioResults> {
    let backend = backends::file_backend(scenario)
        .ok_or_else(|| anyhow!("Scenario {} has no file backend", scenario))?;
    let runner = BenchmarkRunner::new(LatencyRecorder::new(config.iterations));
    let thread_counts = config.thread_counts.clone();

    let runs = tokio::task::spawn_blocking(move || {
        runner.sweep(backend.as_ref(), scenario.label(), &thread_counts)
    })
    .await??;

    Ok(ScenarioResults {
        scenario,
        runs,
        queue: None,
    })
}

/// Run the queue scenario through its full handshake
///
/// A receiver that fails to start or a handshake that times out degrades the
/// run rather than aborting it: the sweep still executes and the received
/// count is reported as observed.
pub async fn run_queue_scenario(config: &ScenarioConfig) -> Result<ScenarioResults> {
    let queue = config.queue.clone();
    let coordination = Arc::new(Coordination::new());
    let mut states = vec![HandshakeState::NotStarted];

    let receiver = {
        let coordination = coordination.clone();
        let endpoint = queue.endpoint.clone();
        let policy = queue.drain;
        tokio::task::spawn_blocking(move || ipc::receive(&endpoint, &coordination, &policy))
    };

    let receiver_ready = coordination.wait_for_receiver(&queue.handshake).await;
    if receiver_ready {
        advance(&mut states, HandshakeState::ReceiverReady);
    } else {
        warn!("Failure to start the test (receiver side), sending anyway");
    }

    advance(&mut states, HandshakeState::Sending);
    let backend = Arc::new(QueueNado::new(queue.endpoint.clone()));
    let runner = BenchmarkRunner::new(LatencyRecorder::new(config.iterations));
    let sweep = {
        let backend = backend.clone();
        let thread_counts = config.thread_counts.clone();
        tokio::task::spawn_blocking(move || {
            runner.sweep(backend.as_ref(), Scenario::QueueNado.label(), &thread_counts)
        })
        .await
    };

    // the receiver must be released even if the sweep failed
    coordination.request_shutdown();
    advance(&mut states, HandshakeState::Draining);
    let drain = receiver.await?;
    advance(&mut states, HandshakeState::Done);
    let runs = sweep??;

    println!("Number of received entries: {}", drain.received);
    if drain.endpoint.dropped > 0 {
        warn!(
            "{} messages dropped at the high-water mark or after the receiver closed",
            drain.endpoint.dropped
        );
    }
    let failed_sends = backend.failed_sends();
    if failed_sends > 0 {
        warn!("{} sends skipped on threads whose send queue failed to activate", failed_sends);
    }

    Ok(ScenarioResults {
        scenario: Scenario::QueueNado,
        runs,
        queue: Some(QueueOutcome {
            receiver_ready,
            received: drain.received,
            failed_sends,
            drain,
            states,
        }),
    })
}

fn advance(states: &mut Vec<HandshakeState>, next: HandshakeState) {
    debug!("Queue scenario: {}", next);
    states.push(next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::{ReceiveQueue, StopReason};
    use std::time::Duration;

    fn quick_config(endpoint: &str) -> ScenarioConfig {
        ScenarioConfig {
            iterations: 200,
            thread_counts: vec![1, 2],
            queue: QueueConfig {
                endpoint: endpoint.to_string(),
                drain: DrainPolicy {
                    receive_timeout: Duration::from_millis(20),
                    max_idle_waits: 20,
                    high_water: defaults::HIGH_WATER_MARK,
                },
                handshake: HandshakePolicy {
                    poll_interval: Duration::from_millis(10),
                    max_polls: 20,
                },
            },
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_queue_scenario_walks_every_state() {
        let config = quick_config("inproc://scenario-states");
        let results = run_queue_scenario(&config).await.unwrap();
        let queue = results.queue.unwrap();

        assert!(queue.receiver_ready);
        assert_eq!(
            queue.states,
            vec![
                HandshakeState::NotStarted,
                HandshakeState::ReceiverReady,
                HandshakeState::Sending,
                HandshakeState::Draining,
                HandshakeState::Done
            ]
        );
        assert_eq!(results.runs.len(), 2);
        assert_eq!(queue.failed_sends, 0);
        // 200 + 2 × 200 messages sent; the receiver may stop before draining them all
        assert!(queue.received <= 600);
        assert_eq!(queue.drain.endpoint.delivered, 600);
        assert_eq!(queue.drain.endpoint.dropped, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_receiver_setup_failure_degrades_the_run() {
        let endpoint = "inproc://scenario-taken";
        let mut squatter = ReceiveQueue::connect(endpoint);
        squatter.prepare_to_receive().unwrap();

        let mut config = quick_config(endpoint);
        config.queue.handshake.max_polls = 3;
        let results = run_queue_scenario(&config).await.unwrap();
        let queue = results.queue.unwrap();

        assert!(!queue.receiver_ready);
        assert!(!queue.states.contains(&HandshakeState::ReceiverReady));
        assert_eq!(queue.states.last(), Some(&HandshakeState::Done));
        assert_eq!(queue.received, 0);
        assert_eq!(queue.drain.stop, StopReason::SetupFailed);
        assert_eq!(results.runs.len(), 2);
        squatter.close();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalid_endpoint_disables_senders() {
        let config = quick_config("udp://scenario-invalid");
        let results = run_queue_scenario(&config).await.unwrap();
        let queue = results.queue.unwrap();

        assert_eq!(queue.received, 0);
        assert_eq!(queue.failed_sends, 600);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_file_scenarios_run_without_installed_writer() {
        let config = ScenarioConfig {
            iterations: 50,
            thread_counts: vec![1, 3],
            queue: QueueConfig::default(),
        };
        for scenario in [Scenario::NanoLog, Scenario::G3Log, Scenario::G3LogStream] {
            let results = run_scenario(scenario, &config).await.unwrap();
            assert_eq!(results.scenario, scenario);
            assert!(results.queue.is_none());
            assert_eq!(results.runs.len(), 2);
            assert_eq!(results.runs[1].reports.len(), 3);
            assert!(results.runs[0].reports.iter().all(|r| r.label == scenario.label()));
        }
    }
}
