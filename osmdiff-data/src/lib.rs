//! Replication and parsing machinery for OpenStreetMap augmented diffs.
//!
//! Responsibilities:
//! - Poll the augmented diff feed and frame each payload with sequence
//!   markers ([`replication`]).
//! - Turn framed payloads into feature collections ([`adiff`]).
//! - Join the two into a single event stream ([`pipeline`]).
//!
//! Boundaries:
//! - Domain rules (action resolution, geometry classification) live in
//!   `osmdiff-core`.
//! - Checkpoint persistence belongs to the caller.
//!
//! Invariants:
//! - No global mutable state; every cache is owned by one parser.
//! - The parser performs no I/O and never suspends.

#![forbid(unsafe_code)]

pub mod adiff;
pub mod pipeline;
pub mod replication;

pub use adiff::{AdiffParseError, DiffEvent, DiffParser};
pub use pipeline::{PipelineError, parse_stream, replicate};
pub use replication::{
    Checkpoint, Clock, HttpReplicationTransport, HttpTransportConfig, ReplicationError,
    ReplicationOptions, ReplicationSource, ReplicationTransport, SourceState, TokioClock,
    TransportError,
};
