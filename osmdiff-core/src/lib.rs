//! Core domain types for augmented diff processing.
//!
//! These models describe the elements, actions and features that flow
//! from an augmented diff payload to downstream consumers. Nothing here
//! performs I/O; the parsing and replication machinery lives in
//! `osmdiff-data`.
//!
//! Invariants:
//! - Coordinates are WGS84 with `x = longitude` and `y = latitude`.
//! - Tag maps are ordered so serialised output is deterministic.

#![forbid(unsafe_code)]

pub mod action;
pub mod area;
pub mod element;
pub mod feature;
pub mod sequence;
pub mod slot;

pub use action::{ActionKind, ActionOutcome, ActionRecord, Suppression};
pub use area::is_area;
pub use element::{ElementBody, ElementKind, ElementMeta, Member, NodeRef, RawElement, Tags};
pub use feature::{
    FeatureCollection, FeatureError, FeatureLabel, FeatureProperties, Geometry, GeometryFeature,
    build_feature,
};
pub use sequence::{
    DiffContext, MarkerStatus, SEQUENCE_EPOCH_SECS, SEQUENCE_INTERVAL_SECS, SequenceMarker,
    nominal_timestamp,
};
pub use slot::{Slot, Slotted};
