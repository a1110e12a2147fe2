use crate::scenario::ScenarioResults;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Complete output of one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub run_id: Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub system_info: SystemInfo,
    pub scenarios: Vec<ScenarioResults>,
}

/// System information for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub benchmark_version: String,
}

impl SystemInfo {
    pub fn collect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: num_cpus::get(),
            benchmark_version: crate::VERSION.to_string(),
        }
    }
}

/// Collects scenario results and writes them as JSON on finalize
///
/// Without an output file the manager only keeps results in memory.
pub struct ResultsManager {
    output_file: Option<PathBuf>,
    results: BenchmarkResults,
}

impl ResultsManager {
    pub fn new(output_file: Option<&Path>) -> Self {
        Self {
            output_file: output_file.map(Path::to_path_buf),
            results: BenchmarkResults {
                run_id: Uuid::new_v4(),
                timestamp: chrono::Utc::now(),
                system_info: SystemInfo::collect(),
                scenarios: Vec::new(),
            },
        }
    }

    pub fn add_results(&mut self, results: ScenarioResults) {
        debug!("Adding {} runs for scenario {}", results.runs.len(), results.scenario);
        self.results.scenarios.push(results);
    }

    pub fn results(&self) -> &BenchmarkResults {
        &self.results
    }

    /// Write the collected results, if an output file was requested
    pub fn finalize(&self) -> Result<()> {
        let Some(path) = self.output_file.as_ref() else {
            return Ok(());
        };

        let file = File::create(path)
            .with_context(|| format!("Failed to create results file {:?}", path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.results)?;
        writeln!(writer)?;
        writer.flush()?;

        info!("Results written to {:?}", path);
        Ok(())
    }
}
