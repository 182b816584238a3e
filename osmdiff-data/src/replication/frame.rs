//! Wire framing for replicated payloads.

use std::io::Read;

use flate2::read::GzDecoder;
use osmdiff_core::SequenceMarker;

use super::TransportError;

/// Byte appended after each framed payload for chunked transports.
pub const RECORD_SEPARATOR: u8 = 0x1e;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A decoded payload and the sequence it was published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedPayload {
    /// Replication sequence number.
    pub sequence: u64,
    /// Uncompressed diff XML.
    pub body: Vec<u8>,
}

impl FramedPayload {
    /// Render the payload bracketed by its start and end markers.
    ///
    /// # Examples
    /// ```
    /// use osmdiff_data::replication::FramedPayload;
    ///
    /// let payload = FramedPayload { sequence: 3, body: b"<osm/>".to_vec() };
    /// let wire = String::from_utf8(payload.into_wire(false)).expect("utf-8");
    /// assert_eq!(
    ///     wire,
    ///     "<!-- {status: start, sequenceNumber: 3} -->\n<osm/>\n<!-- {status: end, sequenceNumber: 3} -->\n",
    /// );
    /// ```
    #[must_use]
    pub fn into_wire(self, record_separator: bool) -> Vec<u8> {
        let start = SequenceMarker::start(self.sequence).to_comment();
        let end = SequenceMarker::end(self.sequence).to_comment();
        let mut wire = Vec::with_capacity(self.body.len() + start.len() + end.len() + 4);
        wire.extend_from_slice(start.as_bytes());
        wire.push(b'\n');
        wire.extend(self.body);
        wire.push(b'\n');
        wire.extend_from_slice(end.as_bytes());
        wire.push(b'\n');
        if record_separator {
            wire.push(RECORD_SEPARATOR);
        }
        wire
    }
}

/// Inflate `raw` when it starts with the gzip magic bytes.
///
/// # Errors
/// Returns [`TransportError::Decompress`] when the gzip stream is corrupt.
pub fn decode_body(sequence: u64, raw: Vec<u8>) -> Result<Vec<u8>, TransportError> {
    if !raw.starts_with(&GZIP_MAGIC) {
        return Ok(raw);
    }
    let mut decoded = Vec::new();
    GzDecoder::new(raw.as_slice())
        .read_to_end(&mut decoded)
        .map_err(|source| TransportError::Decompress { sequence, source })?;
    Ok(decoded)
}
