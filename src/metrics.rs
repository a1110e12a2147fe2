use crate::backends::LogOperation;
use crate::clock::{Clock, MonotonicClock};
use crate::defaults;
use anyhow::{anyhow, Result};
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column headers of the per-thread report table
const REPORT_COLUMNS: [&str; 7] = ["50th", "75th", "90th", "99th", "99.9th", "Worst", "Average"];

/// Index of the `p` cut point in a sorted sequence of `len` samples
///
/// `floor(len × p)`, clamped to the last element so `p` close to 1 never
/// reads past the end.
pub fn percentile_index(len: usize, p: f64) -> usize {
    ((len as f64 * p) as usize).min(len.saturating_sub(1))
}

/// Elapsed-time samples of one thread-run, sorted ascending
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSet {
    samples: Vec<u64>,
}

impl SampleSet {
    /// Take ownership of recorded samples and sort them
    pub fn from_unsorted(mut samples: Vec<u64>) -> Self {
        samples.sort();
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.samples
    }

    /// Sample value at the given fractional rank (0 when empty)
    pub fn percentile(&self, p: f64) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        self.samples[percentile_index(self.samples.len(), p)]
    }

    /// Largest sample (0 when empty)
    pub fn worst(&self) -> u64 {
        self.samples.last().copied().unwrap_or(0)
    }

    /// Arithmetic mean (0.0 when empty)
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: u128 = self.samples.iter().map(|&s| s as u128).sum();
        sum as f64 / self.samples.len() as f64
    }

    /// Derive the percentile report for this thread-run
    pub fn report(&self, label: &str) -> PercentileReport {
        let [p50, p75, p90, p99, p999] = defaults::PERCENTILES.map(|p| self.percentile(p));
        PercentileReport {
            label: label.to_string(),
            samples: self.samples.len(),
            p50,
            p75,
            p90,
            p99,
            p999,
            worst: self.worst(),
            average: self.mean(),
        }
    }

    /// Build an HDR histogram over the samples for cross-thread merging
    pub fn to_histogram(&self) -> Result<Histogram<u64>> {
        // 3 significant figures, auto-resizing
        let mut histogram = Histogram::<u64>::new(3)?;
        for &sample in &self.samples {
            histogram.record(sample)?;
        }
        Ok(histogram)
    }
}

/// Percentile view over one thread's samples, in microseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileReport {
    pub label: String,
    pub samples: usize,
    pub p50: u64,
    pub p75: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub worst: u64,
    pub average: f64,
}

impl fmt::Display for PercentileReport {
    /// Two-row fixed-width table prefixed by the backend label
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} percentile latency numbers in microseconds", self.label)?;
        for column in REPORT_COLUMNS {
            write!(f, "{:>9}|", column)?;
        }
        writeln!(f)?;
        for value in [self.p50, self.p75, self.p90, self.p99, self.p999, self.worst] {
            write!(f, "{:>9}|", value)?;
        }
        writeln!(f, "{:>9.6}|", self.average)
    }
}

/// Times single invocations of a logging operation on the calling thread
pub struct LatencyRecorder<C: Clock = MonotonicClock> {
    clock: C,
    iterations: usize,
    payload_tag: &'static str,
}

impl LatencyRecorder<MonotonicClock> {
    /// Create a recorder using the monotonic clock
    pub fn new(iterations: usize) -> Self {
        Self::with_clock(MonotonicClock, iterations)
    }
}

impl Default for LatencyRecorder<MonotonicClock> {
    fn default() -> Self {
        Self::new(defaults::ITERATIONS)
    }
}

impl<C: Clock> LatencyRecorder<C> {
    pub fn with_clock(clock: C, iterations: usize) -> Self {
        Self {
            clock,
            iterations,
            payload_tag: defaults::PAYLOAD_TAG,
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Run the timed loop and return the sorted samples
    ///
    /// Each iteration reads the clock, invokes `operation(i, "benchmark")`,
    /// reads the clock again and keeps the difference. The operation is not
    /// expected to fail; adapters swallow their own errors.
    pub fn record_samples<O: LogOperation + ?Sized>(&self, operation: &O) -> SampleSet {
        let mut latencies = Vec::with_capacity(self.iterations);
        for i in 0..self.iterations as u64 {
            let begin = self.clock.now_micros();
            operation.log(i, self.payload_tag);
            let end = self.clock.now_micros();
            latencies.push(end.saturating_sub(begin));
        }
        SampleSet::from_unsorted(latencies)
    }

    /// Record, print the report table to stdout and return it with the samples
    pub fn record<O: LogOperation + ?Sized>(
        &self,
        operation: &O,
        label: &str,
    ) -> (PercentileReport, SampleSet) {
        let samples = self.record_samples(operation);
        let report = samples.report(label);
        // one write so concurrent threads never split a table
        print!("{}", report);
        (report, samples)
    }
}

/// Latency summary across every thread of one sweep step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_samples: u64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p99_us: u64,
    pub p999_us: u64,
    pub max_us: u64,
    pub mean_us: f64,
}

impl RunSummary {
    /// Merge per-thread histograms into one summary
    pub fn aggregate(sample_sets: &[SampleSet]) -> Result<Self> {
        let mut merged = Histogram::<u64>::new(3)?;
        for set in sample_sets {
            merged
                .add(set.to_histogram()?)
                .map_err(|e| anyhow!("Failed to merge latency histograms: {:?}", e))?;
        }

        if merged.len() == 0 {
            return Ok(Self {
                total_samples: 0,
                p50_us: 0,
                p90_us: 0,
                p99_us: 0,
                p999_us: 0,
                max_us: 0,
                mean_us: 0.0,
            });
        }

        Ok(Self {
            total_samples: merged.len(),
            p50_us: merged.value_at_quantile(0.50),
            p90_us: merged.value_at_quantile(0.90),
            p99_us: merged.value_at_quantile(0.99),
            p999_us: merged.value_at_quantile(0.999),
            max_us: merged.max(),
            mean_us: merged.mean(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Clock that advances by a fixed step on every reading
    pub(crate) struct StepClock {
        now: AtomicU64,
        step: u64,
    }

    impl StepClock {
        pub(crate) fn new(step: u64) -> Self {
            Self {
                now: AtomicU64::new(0),
                step,
            }
        }
    }

    impl Clock for StepClock {
        fn now_micros(&self) -> u64 {
            self.now.fetch_add(self.step, Ordering::SeqCst)
        }
    }

    /// Clock replaying a scripted sequence of elapsed times
    struct ScriptedClock {
        readings: Mutex<Vec<u64>>,
    }

    impl ScriptedClock {
        /// Each elapsed value becomes a (begin, end) pair of readings
        fn from_elapsed(elapsed: &[u64]) -> Self {
            let mut readings = Vec::new();
            let mut now = 0;
            for &e in elapsed {
                readings.push(now);
                now += e;
                readings.push(now);
                now += 1;
            }
            readings.reverse();
            Self {
                readings: Mutex::new(readings),
            }
        }
    }

    impl Clock for ScriptedClock {
        fn now_micros(&self) -> u64 {
            self.readings.lock().pop().unwrap_or(0)
        }
    }

    fn noop(_: u64, _: &str) {}

    #[test]
    fn test_percentile_index_is_clamped() {
        assert_eq!(percentile_index(100_000, 0.5), 50_000);
        assert_eq!(percentile_index(100_000, 0.999), 99_900);
        assert_eq!(percentile_index(10, 1.0), 9);
        assert_eq!(percentile_index(1, 0.999), 0);
        assert_eq!(percentile_index(0, 0.5), 0);
    }

    #[test]
    fn test_report_matches_sorted_samples() {
        let elapsed: Vec<u64> = (0..1000).rev().map(|v| (v * 7) % 1000).collect();
        let clock = ScriptedClock::from_elapsed(&elapsed);
        let recorder = LatencyRecorder::with_clock(clock, elapsed.len());
        let samples = recorder.record_samples(&noop);

        let mut sorted = elapsed.clone();
        sorted.sort();
        assert_eq!(samples.as_slice(), sorted.as_slice());

        let report = samples.report("scripted");
        let at = |p: f64| sorted[percentile_index(sorted.len(), p)];
        assert_eq!(report.p50, at(0.50));
        assert_eq!(report.p75, at(0.75));
        assert_eq!(report.p90, at(0.90));
        assert_eq!(report.p99, at(0.99));
        assert_eq!(report.p999, at(0.999));
        assert_eq!(report.worst, *sorted.iter().max().unwrap());
        assert!(report.p50 <= report.p75);
        assert!(report.p75 <= report.p90);
        assert!(report.p90 <= report.p99);
        assert!(report.p99 <= report.p999);
        assert!(report.p999 <= report.worst);
    }

    #[test]
    fn test_zero_elapsed_yields_zero_report() {
        let recorder = LatencyRecorder::with_clock(StepClock::new(0), 1000);
        for _ in 0..2 {
            let report = recorder.record_samples(&noop).report("zero");
            assert_eq!(report.p50, 0);
            assert_eq!(report.p999, 0);
            assert_eq!(report.worst, 0);
            assert_eq!(report.average, 0.0);
            assert_eq!(report.samples, 1000);
        }
    }

    #[test]
    fn test_single_iteration_resolves_every_percentile_to_it() {
        let recorder = LatencyRecorder::with_clock(ScriptedClock::from_elapsed(&[42]), 1);
        let report = recorder.record_samples(&noop).report("single");
        assert_eq!(
            [report.p50, report.p75, report.p90, report.p99, report.p999, report.worst],
            [42; 6]
        );
        assert_eq!(report.average, 42.0);
    }

    #[test]
    fn test_operation_receives_index_and_payload_tag() {
        let seen = Mutex::new(Vec::new());
        let op = |i: u64, tag: &str| seen.lock().push((i, tag.to_string()));
        LatencyRecorder::with_clock(StepClock::new(1), 3).record_samples(&op);
        let seen = seen.into_inner();
        assert_eq!(
            seen,
            vec![
                (0, "benchmark".to_string()),
                (1, "benchmark".to_string()),
                (2, "benchmark".to_string())
            ]
        );
    }

    #[test]
    fn test_record_returns_report_and_samples() {
        let recorder = LatencyRecorder::with_clock(ScriptedClock::from_elapsed(&[5, 1, 3]), 3);
        let (report, samples) = recorder.record(&noop, "recorded");
        assert_eq!(samples.as_slice(), &[1, 3, 5]);
        assert_eq!(report, samples.report("recorded"));
        assert_eq!(report.worst, 5);
    }

    #[test]
    fn test_empty_sample_set() {
        let report = SampleSet::default().report("empty");
        assert_eq!(report.worst, 0);
        assert_eq!(report.average, 0.0);
    }

    #[test]
    fn test_report_table_layout() {
        let report = SampleSet::from_unsorted(vec![3, 1, 2]).report("nanolog_guaranteed");
        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "nanolog_guaranteed percentile latency numbers in microseconds");
        assert_eq!(
            lines[1],
            "     50th|     75th|     90th|     99th|   99.9th|    Worst|  Average|"
        );
        assert_eq!(
            lines[2],
            "        2|        3|        3|        3|        3|        3| 2.000000|"
        );
    }

    #[test]
    fn test_run_summary_merges_threads() {
        let a = SampleSet::from_unsorted(vec![1; 100]);
        let b = SampleSet::from_unsorted(vec![1000; 100]);
        let summary = RunSummary::aggregate(&[a, b]).unwrap();
        assert_eq!(summary.total_samples, 200);
        assert_eq!(summary.max_us, 1000);
        assert_eq!(summary.p50_us, 1);
        assert!(summary.p99_us >= 999);
    }

    #[test]
    fn test_run_summary_of_nothing() {
        let summary = RunSummary::aggregate(&[]).unwrap();
        assert_eq!(summary.total_samples, 0);
        assert_eq!(summary.mean_us, 0.0);
    }
}
