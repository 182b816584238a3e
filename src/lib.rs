//! Facade crate for OpenStreetMap augmented diff processing.
//!
//! This crate re-exports the domain types together with the replication
//! source, the streaming parser and the adapters joining them.

#![forbid(unsafe_code)]

pub use osmdiff_core::{
    ActionKind, ElementKind, FeatureCollection, FeatureLabel, Geometry, GeometryFeature,
    SequenceMarker, Tags,
};

pub use osmdiff_data::{
    AdiffParseError, DiffEvent, DiffParser, HttpReplicationTransport, HttpTransportConfig,
    PipelineError, ReplicationError, ReplicationOptions, ReplicationSource, ReplicationTransport,
    parse_stream, replicate,
};
