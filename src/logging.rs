use crate::backends::BACKEND_TARGET;
use anyhow::{anyhow, Result};
use colored::*;
use std::fmt;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::filter::{filter_fn, FilterExt, Targets};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Diagnostic formatter for stderr
///
/// Every line carries the level and the call site it was emitted from,
/// `ERROR : module::path L: 42 message`, and is coloured by level.
pub struct CallSiteFormatter;

impl<S, N> FormatEvent<S, N> for CallSiteFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = String::new();
        ctx.format_fields(Writer::new(&mut fields), event)?;

        let metadata = event.metadata();
        let line = call_site_line(
            metadata.level(),
            metadata.module_path().unwrap_or_else(|| metadata.target()),
            metadata.line(),
            &fields,
        );

        let colored_output = match *metadata.level() {
            Level::INFO => line.white(),
            Level::WARN => line.yellow(),
            Level::ERROR => line.red(),
            Level::DEBUG => line.blue(),
            Level::TRACE => line.purple(),
        };
        writeln!(writer, "{}", colored_output)
    }
}

fn call_site_line(level: &Level, module: &str, line: Option<u32>, message: &str) -> String {
    match line {
        Some(line) => format!("{} : {} L: {} {}", level, module, line, message),
        None => format!("{} : {} {}", level, module, message),
    }
}

/// Default diagnostic filter when `RUST_LOG` is unset
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "log_latency_bench=debug"
    } else {
        "log_latency_bench=info"
    }
}

/// Install the global subscriber
///
/// Diagnostics go to stderr through [`CallSiteFormatter`], filtered by
/// `RUST_LOG`. When `backend_writer` is given, events under
/// [`BACKEND_TARGET`] are written there as plain lines and never reach
/// stderr. Can only succeed once per process.
pub fn init(verbose: bool, backend_writer: Option<NonBlocking>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let diagnostics = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .event_format(CallSiteFormatter)
        .with_filter(env_filter.and(filter_fn(|metadata: &Metadata<'_>| {
            metadata.target() != BACKEND_TARGET
        })));

    let backend = backend_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .with_thread_names(true)
            .with_filter(Targets::new().with_target(BACKEND_TARGET, Level::INFO))
    });

    tracing_subscriber::registry()
        .with(diagnostics)
        .with(backend)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))
}
