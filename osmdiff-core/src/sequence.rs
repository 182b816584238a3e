//! Sequence markers embedded between replicated payloads.
//!
//! A replicated payload is bracketed by two XML comments:
//!
//! ```text
//! <!-- {status: start, sequenceNumber: 100} -->
//! <osm>...</osm>
//! <!-- {status: end, sequenceNumber: 100} -->
//! ```
//!
//! The start marker fixes the payload's nominal timestamp, which the
//! minor-version heuristic compares element timestamps against.

use std::{fmt, sync::LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

/// Unix time of sequence zero in the augmented diff feed
/// (`2012-09-12T06:55:00Z`).
pub const SEQUENCE_EPOCH_SECS: i64 = 1_347_432_900;

/// Seconds between consecutive sequence numbers.
pub const SEQUENCE_INTERVAL_SECS: i64 = 60;

#[expect(
    clippy::expect_used,
    reason = "the pattern is a literal checked by the marker tests"
)]
static MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{\s*status\s*:\s*(start|end)\s*,\s*sequenceNumber\s*:\s*(\d+)\s*\}$")
        .expect("marker pattern is a valid regular expression")
});

/// Whether a marker opens or closes a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStatus {
    /// Emitted before the payload.
    Start,
    /// Emitted after the payload.
    End,
}

impl MarkerStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

/// A `{status, sequenceNumber}` pair carried in an XML comment.
///
/// Serializes as `{"status":"start","sequenceNumber":100}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SequenceMarker {
    /// Start or end of the payload.
    pub status: MarkerStatus,
    /// Replication sequence number.
    #[serde(rename = "sequenceNumber")]
    pub sequence: u64,
}

impl SequenceMarker {
    /// Marker opening `sequence`.
    #[must_use]
    pub const fn start(sequence: u64) -> Self {
        Self {
            status: MarkerStatus::Start,
            sequence,
        }
    }

    /// Marker closing `sequence`.
    #[must_use]
    pub const fn end(sequence: u64) -> Self {
        Self {
            status: MarkerStatus::End,
            sequence,
        }
    }

    /// Parse the body of an XML comment.
    ///
    /// Surrounding whitespace is ignored. Anything that does not match
    /// the marker grammar yields `None`.
    ///
    /// # Examples
    /// ```
    /// use osmdiff_core::{MarkerStatus, SequenceMarker};
    ///
    /// let marker = SequenceMarker::parse(" {status: end, sequenceNumber: 42} ")
    ///     .expect("marker should parse");
    /// assert_eq!(marker.status, MarkerStatus::End);
    /// assert_eq!(marker.sequence, 42);
    /// assert!(SequenceMarker::parse("sequenceNumber: 42").is_none());
    /// ```
    #[must_use]
    pub fn parse(comment: &str) -> Option<Self> {
        let captures = MARKER_PATTERN.captures(comment.trim())?;
        let status = match captures.get(1)?.as_str() {
            "start" => MarkerStatus::Start,
            _ => MarkerStatus::End,
        };
        let sequence = captures.get(2)?.as_str().parse().ok()?;
        Some(Self { status, sequence })
    }

    /// Render the marker as a complete XML comment.
    ///
    /// # Examples
    /// ```
    /// use osmdiff_core::SequenceMarker;
    ///
    /// assert_eq!(
    ///     SequenceMarker::start(7).to_comment(),
    ///     "<!-- {status: start, sequenceNumber: 7} -->",
    /// );
    /// ```
    #[must_use]
    pub fn to_comment(&self) -> String {
        format!("<!-- {self} -->")
    }
}

impl fmt::Display for SequenceMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{status: {}, sequenceNumber: {}}}",
            self.status.as_str(),
            self.sequence
        )
    }
}

/// Nominal publication time of a sequence number.
///
/// Returns `None` when the sequence is too large to represent.
///
/// # Examples
/// ```
/// use osmdiff_core::nominal_timestamp;
///
/// let at = nominal_timestamp(1).expect("timestamp in range");
/// assert_eq!(at.to_rfc3339(), "2012-09-12T06:56:00+00:00");
/// ```
#[must_use]
pub fn nominal_timestamp(sequence: u64) -> Option<DateTime<Utc>> {
    let offset = i64::try_from(sequence)
        .ok()?
        .checked_mul(SEQUENCE_INTERVAL_SECS)?;
    DateTime::from_timestamp(SEQUENCE_EPOCH_SECS.checked_add(offset)?, 0)
}

/// Sequence information active while a payload is parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffContext {
    /// Sequence number from the enclosing start marker.
    pub sequence: Option<u64>,
    /// Nominal timestamp derived from `sequence`.
    pub nominal_timestamp: Option<DateTime<Utc>>,
}

impl DiffContext {
    /// Context for a payload opened by a start marker.
    #[must_use]
    pub fn for_sequence(sequence: u64) -> Self {
        Self {
            sequence: Some(sequence),
            nominal_timestamp: nominal_timestamp(sequence),
        }
    }
}
