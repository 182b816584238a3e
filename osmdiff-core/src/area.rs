//! Area classification for closed ways.
//!
//! OpenStreetMap encodes both closed lines (roundabouts, fences) and
//! areas (buildings, parks) as closed ways. The tag set decides which.
//! The tables follow the editor conventions: most keys in
//! [`AREA_KEYS`] make a closed way an area unless the value is listed
//! as linear, while keys in [`AREA_VALUES`] only do so for specific
//! values.

use crate::Tags;

/// Keys implying an area, with the values that keep the way linear.
pub const AREA_KEYS: &[(&str, &[&str])] = &[
    (
        "aerialway",
        &[
            "cable_car",
            "chair_lift",
            "drag_lift",
            "gondola",
            "goods",
            "j-bar",
            "magic_carpet",
            "mixed_lift",
            "platter",
            "rope_tow",
            "t-bar",
            "zip_line",
        ],
    ),
    (
        "aeroway",
        &[
            "jet_bridge",
            "parking_position",
            "runway",
            "taxilane",
            "taxiway",
        ],
    ),
    ("allotments", &[]),
    ("amenity", &["bench"]),
    ("area:highway", &[]),
    (
        "attraction",
        &[
            "dark_ride",
            "river_rafting",
            "summer_toboggan",
            "train",
            "water_slide",
        ],
    ),
    ("building", &[]),
    ("building:part", &[]),
    ("club", &[]),
    ("craft", &[]),
    ("golf", &["cartpath", "hole", "path"]),
    ("healthcare", &[]),
    ("historic", &[]),
    ("indoor", &["corridor", "wall"]),
    ("industrial", &[]),
    ("junction", &[]),
    ("landuse", &[]),
    ("leisure", &["picnic_table", "slipway", "track"]),
    (
        "man_made",
        &[
            "breakwater",
            "crane",
            "cutline",
            "dyke",
            "embankment",
            "goods_conveyor",
            "groyne",
            "pier",
            "pipeline",
            "torii",
        ],
    ),
    ("military", &["trench"]),
    (
        "natural",
        &[
            "arete",
            "bay",
            "cliff",
            "coastline",
            "ridge",
            "strait",
            "tree_row",
            "valley",
        ],
    ),
    ("office", &[]),
    ("piste:type", &["downhill", "hike", "ice_skate", "nordic", "skitour", "sled", "sleigh"]),
    ("place", &[]),
    ("playground", &["balancebeam", "slide", "zipline"]),
    ("power", &["cable", "line", "minor_line"]),
    ("public_transport", &["platform"]),
    ("shop", &[]),
    ("telecom", &[]),
    ("tourism", &["artwork"]),
];

/// Keys that only imply an area for the listed values.
pub const AREA_VALUES: &[(&str, &[&str])] = &[
    ("barrier", &["city_wall", "ditch", "hedge", "retaining_wall", "wall"]),
    ("highway", &["rest_area", "services"]),
    ("railway", &["platform", "roundhouse", "station", "traverser", "turntable", "wash"]),
    ("waterway", &["boatyard", "dam", "dock", "fuel", "riverbank"]),
];

/// Whether a tag set describes an area when drawn as a closed ring.
///
/// `area=no` always wins; `area=yes` always classifies as an area.
///
/// # Examples
/// ```
/// use osmdiff_core::{Tags, is_area};
///
/// let building = Tags::from([("building".to_owned(), "yes".to_owned())]);
/// let coastline = Tags::from([("natural".to_owned(), "coastline".to_owned())]);
/// assert!(is_area(&building));
/// assert!(!is_area(&coastline));
/// ```
#[must_use]
pub fn is_area(tags: &Tags) -> bool {
    match tags.get("area").map(String::as_str) {
        Some("no") => return false,
        Some("yes") => return true,
        _ => {}
    }
    tags.iter().any(|(key, value)| key_implies_area(key, value))
}

fn key_implies_area(key: &str, value: &str) -> bool {
    if value == "no" {
        return false;
    }
    if let Some((_, linear)) = AREA_KEYS.iter().find(|(candidate, _)| *candidate == key) {
        return !linear.contains(&value);
    }
    AREA_VALUES
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .is_some_and(|(_, areas)| areas.contains(&value))
}
