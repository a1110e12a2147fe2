//! # Backend Adapters
//!
//! Every backend is reduced to one call, `log(index, tag)`, that formats and
//! hands off a single message. The recorder times exactly that call.
//!
//! The file-backed loggers all emit `tracing` events under
//! [`BACKEND_TARGET`]. The subscriber installed by [`crate::logging::init`]
//! routes that target to the backend's own non-blocking file writer and keeps
//! it away from the diagnostic stream on stderr.
//!
//! | Scenario      | Label                | Writer policy                   |
//! |---------------|----------------------|---------------------------------|
//! | `nanolog`     | `nanolog_guaranteed` | non-blocking, never drops       |
//! | `g3log`       | `g3log`              | non-blocking, lossy when full   |
//! | `g3logstream` | `g3logstream`        | non-blocking, lossy when full   |
//! | `queuenado`   | `queuenado`          | queue transport, no log file    |

use crate::cli::Scenario;
use crate::defaults;
use crate::error::TransportError;
use crate::ipc;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

/// Event target of the messages being benchmarked
pub const BACKEND_TARGET: &str = "bench_log";

/// Lines the non-blocking writer buffers before applying its overload policy
const BUFFERED_LINES: usize = 128_000;

/// A single "log one message" call
///
/// Implementations must be callable from many threads at once; whatever
/// synchronization they need is their own business.
pub trait LogOperation: Send + Sync {
    fn log(&self, index: u64, tag: &str);
}

impl<F> LogOperation for F
where
    F: Fn(u64, &str) + Send + Sync,
{
    #[inline]
    fn log(&self, index: u64, tag: &str) {
        self(index, tag)
    }
}

/// Guaranteed asynchronous file logger
///
/// Formats lazily through `tracing` and hands the event to a non-blocking
/// writer configured never to drop lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct NanoLog;

impl LogOperation for NanoLog {
    #[inline]
    fn log(&self, index: u64, tag: &str) {
        info!(target: BACKEND_TARGET, "Logging {}{}{}{}{}", tag, index, 0, 'K', -42.42);
    }
}

/// Asynchronous worker logger, printf-style
#[derive(Debug, Default, Clone, Copy)]
pub struct G3Log;

impl LogOperation for G3Log {
    #[inline]
    fn log(&self, index: u64, tag: &str) {
        info!(target: BACKEND_TARGET, "Logging {}{}{}{}{:.6}", tag, index, 0, 'K', -42.42);
    }
}

/// Asynchronous worker logger, stream-style
///
/// The message is composed piece by piece into an owned buffer before the
/// event is emitted, so the caller pays for the formatting up front.
#[derive(Debug, Default, Clone, Copy)]
pub struct G3LogStream;

impl LogOperation for G3LogStream {
    #[inline]
    fn log(&self, index: u64, tag: &str) {
        info!(target: BACKEND_TARGET, "{}", compose_message(index, tag));
    }
}

/// Queue transport backend
///
/// Formats the message into an owned string and fires it at the endpoint
/// through this thread's send queue.
#[derive(Debug)]
pub struct QueueNado {
    endpoint: String,
    failed_sends: AtomicU64,
}

impl QueueNado {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            failed_sends: AtomicU64::new(0),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends that failed because this thread's queue could not be activated
    pub fn failed_sends(&self) -> u64 {
        self.failed_sends.load(Ordering::Relaxed)
    }
}

impl LogOperation for QueueNado {
    #[inline]
    fn log(&self, index: u64, tag: &str) {
        // overload drops are counted by the endpoint itself
        let result = ipc::send(&self.endpoint, compose_message(index, tag));
        if let Err(TransportError::NotActivated(_)) = result {
            self.failed_sends.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// `Logging <tag><index>0K-42.42`, written piecewise
fn compose_message(index: u64, tag: &str) -> String {
    let mut line = String::with_capacity(32 + tag.len());
    line.push_str("Logging ");
    line.push_str(tag);
    let _ = write!(line, "{}", index);
    line.push('0');
    line.push('K');
    let _ = write!(line, "{}", -42.42);
    line
}

/// Where and how a file-backed backend writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileSpec {
    pub path: PathBuf,
    /// Drop lines instead of blocking when the writer falls behind
    pub lossy: bool,
}

impl LogFileSpec {
    /// Log file of a scenario under `directory`, if it has one
    pub fn for_scenario(scenario: Scenario, directory: &Path) -> Option<Self> {
        let (file_name, lossy) = match scenario {
            Scenario::NanoLog => ("nanolog.txt", false),
            Scenario::G3Log => ("g3log.txt", true),
            Scenario::G3LogStream => ("g3logstream.txt", true),
            Scenario::QueueNado => return None,
        };
        Some(Self {
            path: directory.join(file_name),
            lossy,
        })
    }

    /// Scenario log file under the fixed log directory
    pub fn default_for(scenario: Scenario) -> Option<Self> {
        Self::for_scenario(scenario, Path::new(defaults::LOG_DIRECTORY))
    }

    /// Create (truncate) the file and start its background writer thread
    ///
    /// The guard must be held until the scenario ends; dropping it flushes
    /// the buffered lines.
    pub fn open(&self) -> std::io::Result<(NonBlocking, WorkerGuard)> {
        let file: File = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(NonBlockingBuilder::default()
            .lossy(self.lossy)
            .buffered_lines_limit(BUFFERED_LINES)
            .thread_name("bench-log-writer")
            .finish(file))
    }
}

/// Adapter for a file-backed scenario
pub fn file_backend(scenario: Scenario) -> Option<Box<dyn LogOperation>> {
    match scenario {
        Scenario::NanoLog => Some(Box::new(NanoLog)),
        Scenario::G3Log => Some(Box::new(G3Log)),
        Scenario::G3LogStream => Some(Box::new(G3LogStream)),
        Scenario::QueueNado => None,
    }
}
