//! GeoJSON-like features describing one side of an edit.
//!
//! Geometry is held as `geo` types and serialised to GeoJSON by hand so
//! the empty placeholder and coordinate order stay under our control.

use chrono::{DateTime, Utc};
use geo::{Coord, LineString, Point, Polygon};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ActionKind, ElementKind, NodeRef, RawElement, Tags, is_area};

/// Minimum number of positions in a closed ring that may form a polygon.
const MIN_POLYGON_POSITIONS: usize = 4;

/// Which side of an action a feature describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureLabel {
    /// Pre-edit state.
    Old,
    /// Post-edit state.
    New,
}

/// Geometry of a feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// A node, or a way with a single position.
    Point(Point<f64>),
    /// An open way, or a closed way without area tags.
    LineString(LineString<f64>),
    /// A closed way with area tags.
    Polygon(Polygon<f64>),
    /// Placeholder for a way with unresolved positions.
    Empty,
}

impl Geometry {
    /// GeoJSON type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Point(_) => "Point",
            Self::LineString(_) => "LineString",
            Self::Polygon(_) => "Polygon",
            Self::Empty => "GeometryCollection",
        }
    }

    /// Classify a fully resolved way ring.
    ///
    /// # Examples
    /// ```
    /// use geo::Coord;
    /// use osmdiff_core::{Geometry, Tags};
    ///
    /// let ring = vec![
    ///     Coord { x: 0.0, y: 0.0 },
    ///     Coord { x: 1.0, y: 0.0 },
    ///     Coord { x: 1.0, y: 1.0 },
    ///     Coord { x: 0.0, y: 0.0 },
    /// ];
    /// let building = Tags::from([("building".to_owned(), "yes".to_owned())]);
    /// assert_eq!(Geometry::from_ring(ring.clone(), &building).type_name(), "Polygon");
    /// assert_eq!(Geometry::from_ring(ring, &Tags::new()).type_name(), "LineString");
    /// ```
    #[must_use]
    pub fn from_ring(coords: Vec<Coord<f64>>, tags: &Tags) -> Self {
        if let [only] = coords.as_slice() {
            return Self::Point(Point::from(*only));
        }
        let closed = coords.len() >= MIN_POLYGON_POSITIONS && coords.first() == coords.last();
        let line = LineString::new(coords);
        if closed && is_area(tags) {
            Self::Polygon(Polygon::new(line, Vec::new()))
        } else {
            Self::LineString(line)
        }
    }
}

fn position(coord: Coord<f64>) -> [f64; 2] {
    [coord.x, coord.y]
}

fn positions(line: &LineString<f64>) -> Vec<[f64; 2]> {
    line.coords().copied().map(position).collect()
}

impl Serialize for Geometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Geometry", 2)?;
        state.serialize_field("type", self.type_name())?;
        match self {
            Self::Point(point) => state.serialize_field("coordinates", &position(point.0))?,
            Self::LineString(line) => state.serialize_field("coordinates", &positions(line))?,
            Self::Polygon(polygon) => {
                let rings: Vec<Vec<[f64; 2]>> = std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(positions)
                    .collect();
                state.serialize_field("coordinates", &rings)?;
            }
            Self::Empty => state.serialize_field("geometries", &[(); 0])?,
        }
        state.end()
    }
}

/// Descriptive properties of a feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureProperties {
    /// Changeset of this version.
    pub changeset: Option<u64>,
    /// Element id.
    pub id: i64,
    /// Effective tags (the paired side's for deletions).
    pub tags: Tags,
    /// Version timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    /// Element type.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// Editing user id.
    pub uid: Option<u64>,
    /// Editing user name.
    pub user: Option<String>,
    /// Element version.
    pub version: Option<u64>,
    /// `false` for deletions.
    pub visible: bool,
    /// Ordered node ids for ways.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nds: Option<Vec<i64>>,
}

/// One side of an edit rendered as a feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct GeometryFeature {
    /// `old` or `new`.
    #[serde(rename = "id")]
    pub label: FeatureLabel,
    /// Feature geometry.
    pub geometry: Geometry,
    /// Feature properties.
    pub properties: FeatureProperties,
}

/// The unit emitted for each qualifying action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    /// Resolved action kind.
    #[serde(rename = "id")]
    pub action: ActionKind,
    /// Sequence the action was published in, when known.
    #[serde(rename = "sequenceNumber", skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// `[new]` for creations, `[old, new]` otherwise.
    pub features: Vec<GeometryFeature>,
}

impl FeatureCollection {
    /// Element type of the collection's features.
    #[must_use]
    pub fn element_kind(&self) -> Option<ElementKind> {
        self.features.first().map(|feature| feature.properties.kind)
    }

    /// Feature for the given side, if present.
    #[must_use]
    pub fn feature(&self, label: FeatureLabel) -> Option<&GeometryFeature> {
        self.features.iter().find(|feature| feature.label == label)
    }
}

/// Reasons a feature cannot be built for an element.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FeatureError {
    /// Neither side of a node published coordinates.
    #[error("node {id} has no coordinates on either side of the edit")]
    MissingCoordinates {
        /// Node id.
        id: i64,
    },
    /// Neither side of a way listed any node references.
    #[error("way {id} has no node references on either side of the edit")]
    EmptyWay {
        /// Way id.
        id: i64,
    },
    /// Relations are not rendered.
    #[error("{kind:?} {id} cannot be rendered as a feature")]
    UnsupportedKind {
        /// Element type.
        kind: ElementKind,
        /// Element id.
        id: i64,
    },
}

/// Render one side of an action as a feature.
///
/// `paired` is the opposite side of the same action. It supplies
/// coordinates, node references and tags when `element` lacks them, which
/// keeps deletions renderable.
///
/// # Errors
/// Returns [`FeatureError`] when no geometry can be derived from either
/// side, or when `element` is a relation.
///
/// # Examples
/// ```
/// use osmdiff_core::{ElementBody, FeatureLabel, Geometry, RawElement, build_feature};
///
/// let node = RawElement::new(1, ElementBody::Node { lat: Some(2.0), lon: Some(1.0) });
/// let feature = build_feature(FeatureLabel::New, &node, None)?;
/// assert!(matches!(feature.geometry, Geometry::Point(_)));
/// # Ok::<(), osmdiff_core::FeatureError>(())
/// ```
pub fn build_feature(
    label: FeatureLabel,
    element: &RawElement,
    paired: Option<&RawElement>,
) -> Result<GeometryFeature, FeatureError> {
    let tags = effective_tags(element, paired);
    let (geometry, nds) = match element.kind() {
        ElementKind::Node => (node_geometry(element, paired)?, None),
        ElementKind::Way => {
            let nodes = way_nodes(element, paired)?;
            let nds = nodes.iter().map(|node| node.id).collect();
            (way_geometry(nodes, &tags), Some(nds))
        }
        ElementKind::Relation => {
            return Err(FeatureError::UnsupportedKind {
                kind: ElementKind::Relation,
                id: element.id,
            });
        }
    };
    Ok(GeometryFeature {
        label,
        geometry,
        properties: FeatureProperties {
            changeset: element.meta.changeset,
            id: element.id,
            tags,
            timestamp: element.meta.timestamp,
            kind: element.kind(),
            uid: element.meta.uid,
            user: element.meta.user.clone(),
            version: element.meta.version,
            visible: element.visible,
            nds,
        },
    })
}

fn effective_tags(element: &RawElement, paired: Option<&RawElement>) -> Tags {
    match paired {
        Some(other) if !element.visible => other.tags.clone(),
        _ => element.tags.clone(),
    }
}

fn node_geometry(
    element: &RawElement,
    paired: Option<&RawElement>,
) -> Result<Geometry, FeatureError> {
    element
        .coord()
        .or_else(|| paired.and_then(RawElement::coord))
        .map(|coord| Geometry::Point(Point::from(coord)))
        .ok_or(FeatureError::MissingCoordinates { id: element.id })
}

fn way_nodes<'a>(
    element: &'a RawElement,
    paired: Option<&'a RawElement>,
) -> Result<&'a [NodeRef], FeatureError> {
    let own = element.way_nodes();
    let nodes = match paired {
        Some(other) if own.is_empty() => other.way_nodes(),
        _ => own,
    };
    if nodes.is_empty() {
        return Err(FeatureError::EmptyWay { id: element.id });
    }
    Ok(nodes)
}

fn way_geometry(nodes: &[NodeRef], tags: &Tags) -> Geometry {
    nodes
        .iter()
        .map(NodeRef::coord)
        .collect::<Option<Vec<_>>>()
        .map_or(Geometry::Empty, |coords| Geometry::from_ring(coords, tags))
}
