//! # Concurrent Benchmark Runner
//!
//! Runs N independent latency recorders in parallel OS threads against the
//! same logging operation and joins them before returning. The scenario
//! selector calls [`BenchmarkRunner::sweep`] once per scenario, which runs
//! the thread counts one after another, never overlapping.
//!
//! Reports are printed by each worker as soon as it finishes, so tables of
//! different threads may appear in any order.

use crate::backends::LogOperation;
use crate::clock::{Clock, MonotonicClock};
use crate::metrics::{LatencyRecorder, PercentileReport, RunSummary, SampleSet};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::thread;
use tracing::{debug, info};

/// One sweep step: a backend measured at one thread count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub backend: String,
    pub thread_count: usize,
    pub iterations: usize,
    /// One report per worker thread, in spawn order
    pub reports: Vec<PercentileReport>,
    pub summary: RunSummary,
}

/// Spawns worker threads, each driving its own pass of the recorder
pub struct BenchmarkRunner<C: Clock = MonotonicClock> {
    recorder: LatencyRecorder<C>,
}

impl<C: Clock> BenchmarkRunner<C> {
    pub fn new(recorder: LatencyRecorder<C>) -> Self {
        Self { recorder }
    }

    pub fn recorder(&self) -> &LatencyRecorder<C> {
        &self.recorder
    }

    /// Measure `operation` with `thread_count` concurrent threads
    ///
    /// Prints the thread count, then every worker prints its own report.
    /// Blocks until all workers have finished.
    pub fn run<O: LogOperation + ?Sized>(
        &self,
        operation: &O,
        thread_count: usize,
        label: &str,
    ) -> Result<BenchmarkRun> {
        println!("\nThread count: {}", thread_count);
        debug!("Spawning {} workers for {}", thread_count, label);

        let results: Vec<(PercentileReport, SampleSet)> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(thread_count);
            for worker_id in 0..thread_count {
                let recorder = &self.recorder;
                let handle = thread::Builder::new()
                    .name(format!("bench-worker-{}", worker_id))
                    .spawn_scoped(scope, move || recorder.record(operation, label))
                    .with_context(|| format!("Failed to spawn benchmark worker {}", worker_id))?;
                handles.push(handle);
            }

            handles
                .into_iter()
                .enumerate()
                .map(|(worker_id, handle)| {
                    handle
                        .join()
                        .map_err(|_| anyhow!("Benchmark worker {} panicked", worker_id))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let (reports, sample_sets): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        let summary = RunSummary::aggregate(&sample_sets)?;
        info!(
            "{} x{}: {} samples, p50 {}us, p99 {}us, p99.9 {}us, max {}us, mean {:.3}us",
            label,
            thread_count,
            summary.total_samples,
            summary.p50_us,
            summary.p99_us,
            summary.p999_us,
            summary.max_us,
            summary.mean_us
        );

        Ok(BenchmarkRun {
            backend: label.to_string(),
            thread_count,
            iterations: self.recorder.iterations(),
            reports,
            summary,
        })
    }

    /// Run every thread count in order, one step at a time
    pub fn sweep<O: LogOperation + ?Sized>(
        &self,
        operation: &O,
        label: &str,
        thread_counts: &[usize],
    ) -> Result<Vec<BenchmarkRun>> {
        thread_counts
            .iter()
            .map(|&thread_count| self.run(operation, thread_count, label))
            .collect()
    }
}

impl Default for BenchmarkRunner<MonotonicClock> {
    fn default() -> Self {
        Self::new(LatencyRecorder::default())
    }
}
