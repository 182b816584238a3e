//! Raw OpenStreetMap elements rebuilt from augmented diff markup.
//!
//! A [`RawElement`] is filled in attribute by attribute while the parser
//! walks an action block. Way node references start life as stubs that
//! only carry the inline coordinates and are later resolved against the
//! payload's node cache.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use geo::Coord;
use serde::{Deserialize, Serialize};

/// OpenStreetMap key/value tags.
pub type Tags = BTreeMap<String, String>;

/// The three OpenStreetMap element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A point with coordinates.
    Node,
    /// An ordered list of node references.
    Way,
    /// A group of members. Parsed for lookups only.
    Relation,
}

impl ElementKind {
    /// Map an XML element name onto an element kind.
    ///
    /// # Examples
    /// ```
    /// use osmdiff_core::ElementKind;
    ///
    /// assert_eq!(ElementKind::from_name("way"), Some(ElementKind::Way));
    /// assert_eq!(ElementKind::from_name("nd"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "node" => Some(Self::Node),
            "way" => Some(Self::Way),
            "relation" => Some(Self::Relation),
            _ => None,
        }
    }

    /// Lowercase name as used in markup and feature properties.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

/// Edit metadata attached to every element version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementMeta {
    /// Element version.
    pub version: Option<u64>,
    /// Changeset that produced this version.
    pub changeset: Option<u64>,
    /// Numeric id of the editing user.
    pub uid: Option<u64>,
    /// Display name of the editing user.
    pub user: Option<String>,
    /// Time the version was created.
    pub timestamp: Option<DateTime<Utc>>,
}

/// A node reference held by a way.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRef {
    /// Referenced node id.
    pub id: i64,
    /// Latitude, when known.
    pub lat: Option<f64>,
    /// Longitude, when known.
    pub lon: Option<f64>,
    /// Metadata copied from the cached node once resolved.
    pub meta: Option<ElementMeta>,
}

impl NodeRef {
    /// Build an unresolved reference from inline `nd` coordinates.
    #[must_use]
    pub const fn stub(id: i64, lat: Option<f64>, lon: Option<f64>) -> Self {
        Self {
            id,
            lat,
            lon,
            meta: None,
        }
    }

    /// Resolve this reference against a cached node.
    ///
    /// The node's coordinates win; the inline coordinates are kept when
    /// the cached node has none (a deletion without a published
    /// position).
    #[must_use]
    pub fn resolved_with(&self, node: &RawElement) -> Self {
        let (lat, lon) = match node.body {
            ElementBody::Node { lat, lon } => (lat.or(self.lat), lon.or(self.lon)),
            _ => (self.lat, self.lon),
        };
        Self {
            id: self.id,
            lat,
            lon,
            meta: Some(node.meta.clone()),
        }
    }

    /// Position of the referenced node if both axes are known.
    ///
    /// # Examples
    /// ```
    /// use osmdiff_core::NodeRef;
    ///
    /// let stub = NodeRef::stub(7, Some(51.5), Some(-0.1));
    /// let coord = stub.coord().expect("coordinates present");
    /// assert_eq!((coord.x, coord.y), (-0.1, 51.5));
    /// assert!(NodeRef::stub(8, None, Some(1.0)).coord().is_none());
    /// ```
    #[must_use]
    pub fn coord(&self) -> Option<Coord<f64>> {
        Some(Coord {
            x: self.lon?,
            y: self.lat?,
        })
    }

    /// Timestamp of the resolved node, if any.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.meta.as_ref().and_then(|meta| meta.timestamp)
    }
}

/// A relation member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Member element type.
    pub kind: Option<ElementKind>,
    /// Member element id.
    pub id: Option<i64>,
    /// Role within the relation.
    pub role: String,
}

/// Type-specific payload of a [`RawElement`].
#[derive(Debug, Clone, PartialEq)]
pub enum ElementBody {
    /// Node coordinates; `None` when the diff did not publish them.
    Node {
        /// Latitude.
        lat: Option<f64>,
        /// Longitude.
        lon: Option<f64>,
    },
    /// Ordered node references.
    Way {
        /// References in way order.
        nodes: Vec<NodeRef>,
    },
    /// Relation members.
    Relation {
        /// Members in relation order.
        members: Vec<Member>,
    },
}

/// A single element version as published in an augmented diff.
#[derive(Debug, Clone, PartialEq)]
pub struct RawElement {
    /// Element id.
    pub id: i64,
    /// Edit metadata.
    pub meta: ElementMeta,
    /// `false` when the version marks a deletion.
    pub visible: bool,
    /// Tags carried by this version.
    pub tags: Tags,
    /// Type-specific payload.
    pub body: ElementBody,
}

impl RawElement {
    /// Construct a visible, untagged element with empty metadata.
    ///
    /// # Examples
    /// ```
    /// use osmdiff_core::{ElementBody, ElementKind, RawElement};
    ///
    /// let way = RawElement::new(3, ElementBody::Way { nodes: Vec::new() });
    /// assert_eq!(way.kind(), ElementKind::Way);
    /// assert!(way.visible);
    /// assert!(!way.has_tags());
    /// ```
    #[must_use]
    pub fn new(id: i64, body: ElementBody) -> Self {
        Self {
            id,
            meta: ElementMeta::default(),
            visible: true,
            tags: Tags::new(),
            body,
        }
    }

    /// Construct an empty element of the given kind.
    #[must_use]
    pub fn empty(kind: ElementKind, id: i64) -> Self {
        let body = match kind {
            ElementKind::Node => ElementBody::Node {
                lat: None,
                lon: None,
            },
            ElementKind::Way => ElementBody::Way { nodes: Vec::new() },
            ElementKind::Relation => ElementBody::Relation {
                members: Vec::new(),
            },
        };
        Self::new(id, body)
    }

    /// Element type derived from the body.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self.body {
            ElementBody::Node { .. } => ElementKind::Node,
            ElementBody::Way { .. } => ElementKind::Way,
            ElementBody::Relation { .. } => ElementKind::Relation,
        }
    }

    /// Whether the element carries at least one tag.
    #[must_use]
    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    /// Node position if this is a node with both axes published.
    #[must_use]
    pub fn coord(&self) -> Option<Coord<f64>> {
        match self.body {
            ElementBody::Node {
                lat: Some(lat),
                lon: Some(lon),
            } => Some(Coord { x: lon, y: lat }),
            _ => None,
        }
    }

    /// Node references of a way; empty for other kinds.
    #[must_use]
    pub fn way_nodes(&self) -> &[NodeRef] {
        match &self.body {
            ElementBody::Way { nodes } => nodes,
            _ => &[],
        }
    }

    /// Mutable node references when this element is a way.
    pub fn way_nodes_mut(&mut self) -> Option<&mut Vec<NodeRef>> {
        match &mut self.body {
            ElementBody::Way { nodes } => Some(nodes),
            _ => None,
        }
    }

    /// Mutable member list when this element is a relation.
    pub fn members_mut(&mut self) -> Option<&mut Vec<Member>> {
        match &mut self.body {
            ElementBody::Relation { members } => Some(members),
            _ => None,
        }
    }
}
