//! Newline-delimited JSON rendering of parser events.

use std::io::Write;

use osmdiff_core::SequenceMarker;
use osmdiff_data::DiffEvent;

use crate::CliError;

/// Write `event` as one JSON line.
///
/// Feature collections are rendered as GeoJSON; sequence events as
/// `{"status":"start"|"end","sequenceNumber":N}`.
pub(crate) fn write_event(writer: &mut dyn Write, event: &DiffEvent) -> Result<(), CliError> {
    let line = match event {
        DiffEvent::SequenceStart(sequence) => {
            serde_json::to_string(&SequenceMarker::start(*sequence))
        }
        DiffEvent::SequenceEnd(sequence) => serde_json::to_string(&SequenceMarker::end(*sequence)),
        DiffEvent::Features(collection) => serde_json::to_string(collection),
    }
    .map_err(CliError::SerializeEvent)?;
    writer
        .write_all(line.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}
