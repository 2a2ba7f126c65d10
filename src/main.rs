//! tally - hierarchical progress aggregation CLI
//!
//! Tracks projects, stages and tasks, keeps rollups in sync with task
//! status, and reports portfolio statistics.

use std::process::ExitCode;

use clap::Parser;
use tally::cli::Cli;
use tally::output::{emit_error, infer_command_name_from_args};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Longest `RUST_LOG` value we try to parse.
const MAX_FILTER_LEN: usize = 4096;

/// Logging stays off unless `RUST_LOG` holds a usable filter.
fn log_filter() -> EnvFilter {
    std::env::var("RUST_LOG")
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty() && raw.len() <= MAX_FILTER_LEN)
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new("off"))
}

fn main() -> ExitCode {
    // stdout is reserved for command output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter())
        .init();

    let command = infer_command_name_from_args();
    let cli = Cli::parse();
    let json = cli.json;

    match cli.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = emit_error(&command, &err, json);
            let code = u8::try_from(err.exit_code()).unwrap_or(1);
            ExitCode::from(code)
        }
    }
}
