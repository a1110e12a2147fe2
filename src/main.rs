//! # Log Latency Benchmark - Main Entry Point
//!
//! 1. **Parse arguments**: one scenario token; anything else prints usage and exits 0
//! 2. **Install logging**: diagnostics to stderr, plus the backend's log file if it has one
//! 3. **Run the scenario**: sweep thread counts 1 through 4, printing one table per thread
//! 4. **Write results**: optional JSON output

use anyhow::{Context, Result};
use log_latency_bench::{
    backends::LogFileSpec,
    cli,
    logging,
    results::ResultsManager,
    scenario::{run_scenario, ScenarioConfig},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let Some(args) = cli::parse_args(std::env::args_os()) else {
        cli::print_usage();
        return Ok(());
    };
    let Some(scenario) = args.scenario else {
        cli::print_usage();
        return Ok(());
    };

    // The guard flushes the backend log file when dropped at the end of main
    let (backend_writer, _guard) = match LogFileSpec::default_for(scenario) {
        Some(spec) => {
            let (writer, guard) = spec
                .open()
                .with_context(|| format!("Failed to open log file {:?}", spec.path))?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };
    logging::init(args.verbose, backend_writer)?;

    info!("Starting log latency benchmark {}", log_latency_bench::VERSION);
    info!("Configuration: {:?}", args);

    let mut results_manager = ResultsManager::new(args.output_file.as_deref());
    let results = run_scenario(scenario, &ScenarioConfig::default()).await?;
    results_manager.add_results(results);
    results_manager.finalize()?;
    Ok(())
}
