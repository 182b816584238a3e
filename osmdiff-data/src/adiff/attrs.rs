//! Attribute decoding for diff elements.

use std::{collections::BTreeMap, str::FromStr};

use chrono::{DateTime, Utc};
use osmdiff_core::{ElementBody, ElementKind, ElementMeta, Member, NodeRef, RawElement};
use quick_xml::events::BytesStart;

use super::AdiffParseError;

/// Decoded attributes of one start tag.
#[derive(Debug, Default)]
pub(super) struct Attributes {
    element: String,
    values: BTreeMap<String, String>,
}

impl Attributes {
    /// Decode and unescape every attribute of `start`.
    pub(super) fn collect(element: &str, start: &BytesStart<'_>) -> Result<Self, AdiffParseError> {
        let mut values = BTreeMap::new();
        for entry in start.attributes() {
            let attribute = entry.map_err(|source| AdiffParseError::Attribute {
                element: element.to_owned(),
                source,
            })?;
            let key = std::str::from_utf8(attribute.key.as_ref())
                .map_err(|source| AdiffParseError::Encoding { source })?
                .to_owned();
            let value = attribute
                .unescape_value()
                .map_err(|source| AdiffParseError::Escape {
                    element: element.to_owned(),
                    source,
                })?
                .into_owned();
            values.insert(key, value);
        }
        Ok(Self {
            element: element.to_owned(),
            values,
        })
    }

    pub(super) fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Parsed value; absent or unparsable values are `None`.
    pub(super) fn parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name)?.trim().parse().ok()
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.get("timestamp")?)
            .ok()
            .map(|stamp| stamp.with_timezone(&Utc))
    }

    /// Build an empty element of `kind` from the shared OSM attributes.
    pub(super) fn element(&self, kind: ElementKind) -> Result<RawElement, AdiffParseError> {
        let id = self
            .parsed("id")
            .ok_or_else(|| AdiffParseError::MissingAttribute {
                element: self.element.clone(),
                attribute: "id",
            })?;
        let mut element = RawElement::empty(kind, id);
        element.meta = ElementMeta {
            version: self.parsed("version"),
            changeset: self.parsed("changeset"),
            uid: self.parsed("uid"),
            user: self.get("user").map(str::to_owned),
            timestamp: self.timestamp(),
        };
        element.visible = self.get("visible") != Some("false");
        if kind == ElementKind::Node {
            element.body = ElementBody::Node {
                lat: self.parsed("lat"),
                lon: self.parsed("lon"),
            };
        }
        Ok(element)
    }

    /// Unresolved way reference, if `ref` parses.
    pub(super) fn node_ref(&self) -> Option<NodeRef> {
        Some(NodeRef::stub(
            self.parsed("ref")?,
            self.parsed("lat"),
            self.parsed("lon"),
        ))
    }

    pub(super) fn member(&self) -> Member {
        Member {
            kind: self.get("type").and_then(ElementKind::from_name),
            id: self.parsed("ref"),
            role: self.get("role").unwrap_or_default().to_owned(),
        }
    }

    /// `k`/`v` pair of a `<tag>`.
    pub(super) fn tag(&self) -> Option<(String, String)> {
        Some((self.get("k")?.to_owned(), self.get("v")?.to_owned()))
    }
}
