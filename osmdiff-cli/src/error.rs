//! Error types emitted by the osmdiff CLI.
//!
//! Keep this error type reasonably small, as every command returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use osmdiff_data::{AdiffParseError, PipelineError, TransportError};
use thiserror::Error;

/// Errors emitted by the osmdiff CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name without the leading dashes.
        field: &'static str,
        /// Environment variable that can supply the value.
        env: &'static str,
    },
    /// A numeric option was outside its accepted range.
    #[error("{field} must be at least {minimum}, got {value}")]
    OutOfRange {
        /// Flag name without the leading dashes.
        field: &'static str,
        /// Smallest accepted value.
        minimum: u64,
        /// Value that was supplied.
        value: u64,
    },
    /// The async runtime could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The HTTP client could not be configured.
    #[error("failed to configure replication transport: {0}")]
    Transport(#[source] TransportError),
    /// Replication or parsing failed while streaming.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// Opening the input diff file failed.
    #[error("failed to open augmented diff at {path:?}: {source}")]
    OpenInput {
        /// Path that was requested.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// Reading the input diff file failed part way through.
    #[error("failed to read augmented diff at {path:?}: {source}")]
    ReadInput {
        /// Path being read.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// The input diff file was malformed.
    #[error("failed to parse augmented diff at {path:?}: {source}")]
    ParseInput {
        /// Path being parsed.
        path: Utf8PathBuf,
        /// Parser failure.
        #[source]
        source: AdiffParseError,
    },
    /// Serializing an event failed.
    #[error("failed to serialize event: {0}")]
    SerializeEvent(#[source] serde_json::Error),
    /// Writing an event to the output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
