//! Stream command implementation for the osmdiff CLI.

use std::{io::Write, time::Duration};

use clap::Parser;
use futures_util::{StreamExt, pin_mut};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osmdiff_data::{
    DiffParser, HttpReplicationTransport, HttpTransportConfig, ReplicationOptions,
    ReplicationSource, ReplicationTransport, replicate,
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_STREAM_BASE_URL, ARG_STREAM_DELAY_SECS, ARG_STREAM_DIFF_PATH, ARG_STREAM_INITIAL_SEQUENCE,
    ARG_STREAM_ONCE, ARG_STREAM_RETRY_LIMIT, ARG_STREAM_STATUS_PATH, ARG_STREAM_TIMEOUT_SECS,
    CliError, output::write_event,
};

const DEFAULT_DELAY_SECS: u64 = 30;

/// CLI arguments for the `stream` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Poll an augmented diff replication feed, parse each \
                 sequence and print one JSON line per event. Qualifying \
                 edits are GeoJSON feature collections; sequence \
                 boundaries are status lines.",
    about = "Follow the augmented diff feed"
)]
#[ortho_config(prefix = "OSMDIFF")]
pub(crate) struct StreamArgs {
    /// Base URL of the augmented diff service.
    #[arg(long = ARG_STREAM_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) base_url: Option<String>,
    /// Path of the latest-sequence endpoint below the base URL.
    #[arg(long = ARG_STREAM_STATUS_PATH, value_name = "path")]
    #[serde(default)]
    pub(crate) status_path: Option<String>,
    /// Path of the payload endpoint below the base URL.
    #[arg(long = ARG_STREAM_DIFF_PATH, value_name = "path")]
    #[serde(default)]
    pub(crate) diff_path: Option<String>,
    /// Seconds before an upstream request is abandoned.
    #[arg(long = ARG_STREAM_TIMEOUT_SECS, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    /// First sequence to fetch; negative values count back from latest.
    #[arg(
        long = ARG_STREAM_INITIAL_SEQUENCE,
        value_name = "sequence",
        allow_hyphen_values = true
    )]
    #[serde(default)]
    pub(crate) initial_sequence: Option<i64>,
    /// Seconds to wait between retries and between polls once caught up.
    #[arg(long = ARG_STREAM_DELAY_SECS, value_name = "seconds")]
    #[serde(default)]
    pub(crate) delay_secs: Option<u64>,
    /// Stop once the latest published sequence has been processed.
    #[arg(long = ARG_STREAM_ONCE)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) once: bool,
    /// Give up after this many consecutive failed requests.
    #[arg(long = ARG_STREAM_RETRY_LIMIT, value_name = "count")]
    #[serde(default)]
    pub(crate) retry_limit: Option<u32>,
}

impl StreamArgs {
    pub(crate) fn into_config(self) -> Result<StreamConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        StreamConfig::try_from(merged)
    }
}

/// Resolved `stream` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StreamConfig {
    /// Endpoints and request limits for the feed.
    pub(crate) transport: HttpTransportConfig,
    /// Starting sequence, or `None` for the latest.
    pub(crate) initial_sequence: Option<i64>,
    /// Retry and catch-up delay.
    pub(crate) delay: Duration,
    /// Keep polling after catching up.
    pub(crate) infinite: bool,
    /// Consecutive failures tolerated, or `None` for unlimited.
    pub(crate) retry_limit: Option<u32>,
}

impl StreamConfig {
    pub(crate) fn options(&self) -> ReplicationOptions {
        let options = ReplicationOptions::default()
            .with_delay(self.delay)
            .with_infinite(self.infinite);
        let with_start = match self.initial_sequence {
            Some(sequence) => options.with_initial_sequence(sequence),
            None => options,
        };
        match self.retry_limit {
            Some(limit) => with_start.with_retry_limit(limit),
            None => with_start,
        }
    }
}

impl TryFrom<StreamArgs> for StreamConfig {
    type Error = CliError;

    fn try_from(args: StreamArgs) -> Result<Self, Self::Error> {
        let delay_secs = positive_secs(ARG_STREAM_DELAY_SECS, args.delay_secs, DEFAULT_DELAY_SECS)?;
        let defaults = HttpTransportConfig::default();
        let timeout_secs = positive_secs(
            ARG_STREAM_TIMEOUT_SECS,
            args.timeout_secs,
            defaults.timeout.as_secs(),
        )?;
        let transport = HttpTransportConfig::new(args.base_url.unwrap_or_default())
            .with_endpoints(
                args.status_path.unwrap_or(defaults.status_path),
                args.diff_path.unwrap_or(defaults.diff_path),
            )
            .with_timeout(Duration::from_secs(timeout_secs));
        Ok(Self {
            transport,
            initial_sequence: args.initial_sequence,
            delay: Duration::from_secs(delay_secs),
            infinite: !args.once,
            retry_limit: args.retry_limit,
        })
    }
}

fn positive_secs(field: &'static str, value: Option<u64>, default: u64) -> Result<u64, CliError> {
    match value.unwrap_or(default) {
        0 => Err(CliError::OutOfRange {
            field,
            minimum: 1,
            value: 0,
        }),
        secs => Ok(secs),
    }
}

pub(super) fn run_stream(args: StreamArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    info!("polling {}", config.transport.status_url());
    let transport =
        HttpReplicationTransport::new(config.transport.clone()).map_err(CliError::Transport)?;
    let mut stdout = std::io::stdout().lock();
    run_stream_with(&config, transport, &mut stdout)
}

/// Replicate from `transport` until the source ends or fails, writing
/// every event to `writer`.
pub(super) fn run_stream_with<T: ReplicationTransport>(
    config: &StreamConfig,
    transport: T,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let source = ReplicationSource::new(transport, config.options())
        .with_checkpoint(|sequence| info!("fetched sequence {sequence}"));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(async {
        let events = replicate(source, DiffParser::new());
        pin_mut!(events);
        while let Some(item) = events.next().await {
            write_event(writer, &item?)?;
        }
        Ok::<(), CliError>(())
    })
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<StreamConfig, CliError> {
    let merged = StreamArgs::merge_from_layers(layers).map_err(CliError::from)?;
    StreamConfig::try_from(merged)
}
