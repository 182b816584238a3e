//! Parse command implementation for the osmdiff CLI.

use std::io::{Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osmdiff_data::DiffParser;
use serde::{Deserialize, Serialize};

use crate::{ARG_PARSE_INPUT, CliError, ENV_PARSE_INPUT, output::write_event};

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// CLI arguments for the `parse` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Parse an augmented diff saved on disk, optionally framed \
                 with sequence markers, and print one JSON line per event.",
    about = "Parse a saved augmented diff"
)]
#[ortho_config(prefix = "OSMDIFF")]
pub(crate) struct ParseArgs {
    /// Path to the augmented diff XML.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
}

impl ParseArgs {
    pub(crate) fn into_config(self) -> Result<ParseConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ParseConfig::try_from(merged)
    }
}

/// Resolved `parse` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseConfig {
    /// Diff file to read.
    pub(crate) input: Utf8PathBuf,
}

impl TryFrom<ParseArgs> for ParseConfig {
    type Error = CliError;

    fn try_from(args: ParseArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_PARSE_INPUT,
            env: ENV_PARSE_INPUT,
        })?;
        Ok(Self { input })
    }
}

pub(super) fn run_parse(args: ParseArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let mut stdout = std::io::stdout().lock();
    run_parse_with(&config, &mut stdout)
}

pub(super) fn run_parse_with(config: &ParseConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let path = config.input.as_path();
    let mut file = open_input(path)?;
    let mut parser = DiffParser::new();
    let mut buffer = vec![0_u8; READ_CHUNK_BYTES];
    let mut written = 0_usize;
    loop {
        let read = file.read(&mut buffer).map_err(|source| CliError::ReadInput {
            path: path.to_path_buf(),
            source,
        })?;
        let Some(chunk) = buffer.get(..read).filter(|chunk| !chunk.is_empty()) else {
            break;
        };
        let mut events = Vec::new();
        let outcome = parser.feed(chunk, &mut events);
        for event in &events {
            write_event(writer, event)?;
        }
        written = written.saturating_add(events.len());
        outcome.map_err(|source| parse_failure(path, source))?;
    }
    parser
        .finish()
        .map_err(|source| parse_failure(path, source))?;
    info!("parsed {written} events from {path}");
    Ok(())
}

fn open_input(path: &Utf8Path) -> Result<fs_utf8::File, CliError> {
    fs_utf8::File::open_ambient(path, ambient_authority()).map_err(|source| CliError::OpenInput {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_failure(path: &Utf8Path, source: osmdiff_data::AdiffParseError) -> CliError {
    CliError::ParseInput {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
pub(crate) fn parse_config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ParseConfig, CliError> {
    let merged = ParseArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ParseConfig::try_from(merged)
}
