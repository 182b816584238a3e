//! Command-line interface for streaming OpenStreetMap augmented diffs.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod output;
mod parse;
mod stream;

pub use error::CliError;

use parse::ParseArgs;
use stream::StreamArgs;

pub(crate) const ARG_STREAM_BASE_URL: &str = "base-url";
pub(crate) const ARG_STREAM_INITIAL_SEQUENCE: &str = "initial-sequence";
pub(crate) const ARG_STREAM_DELAY_SECS: &str = "delay-secs";
pub(crate) const ARG_STREAM_ONCE: &str = "once";
pub(crate) const ARG_STREAM_RETRY_LIMIT: &str = "retry-limit";
pub(crate) const ARG_STREAM_TIMEOUT_SECS: &str = "timeout-secs";
pub(crate) const ARG_STREAM_STATUS_PATH: &str = "status-path";
pub(crate) const ARG_STREAM_DIFF_PATH: &str = "diff-path";
pub(crate) const ARG_PARSE_INPUT: &str = "input";
pub(crate) const ENV_PARSE_INPUT: &str = "OSMDIFF_CMDS_PARSE_INPUT";

/// Run the osmdiff CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments or configuration are invalid, or
/// when the selected command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Stream(args) => stream::run_stream(args),
        Command::Parse(args) => parse::run_parse(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "osmdiff",
    about = "Replicate and parse OpenStreetMap augmented diffs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Follow the augmented diff feed and print each edit as GeoJSON.
    Stream(StreamArgs),
    /// Parse a saved augmented diff file and print each edit as GeoJSON.
    Parse(ParseArgs),
}

#[cfg(test)]
mod tests;
