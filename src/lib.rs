//! # Log Latency Benchmark Library
//!
//! Measures the caller-side latency of logging one formatted message under
//! several concurrent thread counts, across competing logging backends and an
//! in-process producer/consumer queue transport.
//!
//! ## Supported Backends
//!
//! - **nanolog**: Guaranteed asynchronous file logger (never drops, blocks when full)
//! - **g3log**: Asynchronous worker logger with printf-style formatting
//! - **g3logstream**: The same worker logger fed with stream-composed messages
//! - **queuenado**: Fire-and-forget sends into a high-water-marked message queue
//!
//! ## Architecture Overview
//!
//! - `clock`: Monotonic microsecond timestamp source
//! - `metrics`: Latency recorder, percentile reports and cross-thread aggregation
//! - `runner`: Concurrent benchmark runner and the fixed thread-count sweep
//! - `backends`: Adapters turning each backend into a single "log one message" call
//! - `ipc`: Queue transport (endpoint registry, per-thread sender, draining receiver)
//! - `coordination`: Start signal, shutdown flag and the queue scenario handshake
//! - `scenario`: Dispatch of one scenario to its backend and the sweep
//! - `results`: JSON results output
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use log_latency_bench::{BenchmarkRunner, LatencyRecorder};
//!
//! fn main() -> anyhow::Result<()> {
//!     let runner = BenchmarkRunner::new(LatencyRecorder::new(1_000));
//!     let op = |i: u64, tag: &str| {
//!         let _ = format!("Logging {}{}", tag, i);
//!     };
//!     let runs = runner.sweep(&op, "format_only", &[1, 2])?;
//!     println!("p99 for one thread: {}", runs[0].reports[0].p99);
//!     Ok(())
//! }
//! ```

/// Adapters for the logging backends under test
///
/// Each adapter wraps one backend's "log a message" call into the
/// `LogOperation` signature the recorder drives, and knows which log file
/// the backend writes to.
pub mod backends;

/// Command-line interface and scenario selection
pub mod cli;

/// Monotonic microsecond clock
pub mod clock;

/// Handshake and shutdown coordination for the queue scenario
///
/// Bundles the start signal and the shutdown flag into one shared value and
/// drives the `NOT_STARTED → RECEIVER_READY → SENDING → DRAINING → DONE`
/// progression of the queue scenario.
pub mod coordination;

pub mod error;

/// Queue transport
///
/// An in-process endpoint registry backed by bounded channels. Senders
/// lazily create one handle per thread; a single receiver drains the
/// endpoint with a bounded idle-timeout policy.
pub mod ipc;

/// Diagnostic log formatting and subscriber installation
pub mod logging;

/// Latency measurement and percentile analysis
///
/// Implements the per-thread latency recorder over exact sorted samples and
/// merges per-thread HDR histograms into a summary for each sweep step.
pub mod metrics;

/// Result collection and JSON output
pub mod results;

/// Concurrent benchmark execution
pub mod runner;

/// Scenario dispatch
pub mod scenario;

pub use backends::LogOperation;
pub use cli::{Args, Scenario};
pub use clock::{Clock, MonotonicClock};
pub use coordination::{Coordination, HandshakePolicy, HandshakeState};
pub use error::TransportError;
pub use ipc::{DrainOutcome, DrainPolicy};
pub use metrics::{LatencyRecorder, PercentileReport, RunSummary, SampleSet};
pub use results::{BenchmarkResults, ResultsManager};
pub use runner::{BenchmarkRun, BenchmarkRunner};

/// The current version of the benchmark
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed benchmark policy
///
/// These values are not tunable from the command line. Internal components
/// accept small policy structs defaulting to these constants so tests can
/// shorten timings.
pub mod defaults {
    use std::time::Duration;

    /// Timed log calls per thread per sweep step
    pub const ITERATIONS: usize = 100_000;

    /// Thread counts swept for every scenario, in order
    pub const THREAD_COUNTS: [usize; 4] = [1, 2, 3, 4];

    /// Payload tag passed to every logging call so all backends log
    /// equivalent-size messages
    pub const PAYLOAD_TAG: &str = "benchmark";

    /// Percentile cut points reported per thread
    pub const PERCENTILES: [f64; 5] = [0.50, 0.75, 0.90, 0.99, 0.999];

    /// Directory the file-backed loggers write into
    pub const LOG_DIRECTORY: &str = "/tmp/";

    /// Well-known queue endpoint shared by senders and the receiver
    pub const QUEUE_ENDPOINT: &str = "ipc:///tmp/nanologtest.ipc";

    /// Queue high-water mark (100 × 500 × 5 messages)
    pub const HIGH_WATER_MARK: usize = 100 * 500 * 5;

    /// Bounded wait of a single receive attempt
    pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

    /// Consecutive empty receives after which the receiver stops draining
    pub const MAX_IDLE_WAITS: usize = 20;

    /// Interval between start-signal polls
    pub const START_POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Start-signal polls before the run proceeds degraded
    pub const MAX_START_POLLS: usize = 20;

    /// Slot tag used for every queued message
    pub const QUEUE_SLOT: u32 = 0;
}
