use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name shown in the usage text
pub const EXECUTABLE: &str = "log-latency-bench";

/// Log Latency Benchmark - per-call latency of asynchronous loggers
#[derive(Parser, Debug, Clone, Default)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Scenario to run (nanolog, g3log, g3logstream, queuenado)
    #[clap(value_enum)]
    pub scenario: Option<Scenario>,

    /// Write all reports as JSON to this file
    #[clap(short = 'o', long)]
    pub output_file: Option<PathBuf>,

    /// Verbose diagnostics on stderr
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

/// Backends that can be benchmarked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Guaranteed asynchronous file logger
    #[clap(name = "nanolog")]
    NanoLog,

    /// Asynchronous worker logger, printf-style formatting
    #[clap(name = "g3log")]
    G3Log,

    /// Asynchronous worker logger, stream-style formatting
    #[clap(name = "g3logstream")]
    G3LogStream,

    /// Producer/consumer queue transport
    #[clap(name = "queuenado")]
    QueueNado,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::NanoLog,
        Scenario::G3Log,
        Scenario::G3LogStream,
        Scenario::QueueNado,
    ];

    /// Command-line token selecting this scenario
    pub fn token(&self) -> &'static str {
        match self {
            Scenario::NanoLog => "nanolog",
            Scenario::G3Log => "g3log",
            Scenario::G3LogStream => "g3logstream",
            Scenario::QueueNado => "queuenado",
        }
    }

    /// Label printed above every report of this scenario
    pub fn label(&self) -> &'static str {
        match self {
            Scenario::NanoLog => "nanolog_guaranteed",
            Scenario::G3Log => "g3log",
            // own label so its tables are not mistaken for the printf-style run
            Scenario::G3LogStream => "g3logstream",
            Scenario::QueueNado => "queuenado",
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Usage text listing every scenario, one per numbered line
pub fn usage_text() -> String {
    let mut text = String::from("Usage \n");
    for (i, scenario) in Scenario::ALL.iter().enumerate() {
        text.push_str(&format!("{}. {} {}\n", i + 1, EXECUTABLE, scenario.token()));
    }
    text
}

pub fn print_usage() {
    print!("{}", usage_text());
}

/// Parse the command line; `None` means the usage text should be shown
///
/// Unknown scenarios, a missing scenario and malformed flags all map to
/// `None`. Showing usage is not an error.
pub fn parse_args<I, T>(argv: I) -> Option<Args>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match Args::try_parse_from(argv) {
        Ok(args) if args.scenario.is_some() => Some(args),
        _ => None,
    }
}
