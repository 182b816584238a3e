//! Action records and their resolution into feature collections.
//!
//! An `<action>` block pairs the pre-edit and post-edit versions of one
//! element. Resolving the record decides whether anything is emitted and
//! under which action kind.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    DiffContext, ElementKind, FeatureCollection, FeatureError, FeatureLabel, RawElement,
    build_feature,
};

/// Largest gap between a version's timestamp and the payload's nominal
/// time for the edit to count as happening in that payload.
const MINOR_VERSION_LAG: TimeDelta = TimeDelta::seconds(60);

/// Kind of edit reported for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// The element is new.
    Create,
    /// The element changed.
    Modify,
    /// The element was removed.
    Delete,
    /// A version bump caused by an edit to something the element
    /// references rather than to the element itself.
    MinorVersion,
}

impl ActionKind {
    /// Map an `<action type="...">` attribute onto a kind.
    ///
    /// `minorVersion` is never published by the feed; it is derived.
    ///
    /// # Examples
    /// ```
    /// use osmdiff_core::ActionKind;
    ///
    /// assert_eq!(ActionKind::from_attribute("delete"), Some(ActionKind::Delete));
    /// assert_eq!(ActionKind::from_attribute("minorVersion"), None);
    /// ```
    #[must_use]
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "modify" => Some(Self::Modify),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
            Self::MinorVersion => "minorVersion",
        }
    }
}

/// Why a resolved action produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suppression {
    /// Relations are never emitted.
    Relation,
    /// Neither side carries tags.
    Untagged,
    /// A way's minor version could not be attributed to any node edit.
    UnattributedMinorVersion,
}

/// Result of resolving an [`ActionRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// A collection to emit.
    Emit(FeatureCollection),
    /// Nothing to emit.
    Suppressed(Suppression),
}

/// The old and new versions of one element under an action kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    /// Kind published by the feed.
    pub kind: ActionKind,
    /// Pre-edit version; absent for creations.
    pub old: Option<RawElement>,
    /// Post-edit version.
    pub new: RawElement,
}

impl ActionRecord {
    /// Whether the `old` to `new` step is a minor version.
    ///
    /// True when the version number did not change, or when the new
    /// version's timestamp trails `nominal` by more than a minute. The
    /// second case catches ways whose version was bumped by an edit to a
    /// member node published in this payload.
    #[must_use]
    pub fn is_minor_version(&self, nominal: Option<DateTime<Utc>>) -> bool {
        let Some(old) = &self.old else {
            return false;
        };
        if old.meta.version == self.new.meta.version {
            return true;
        }
        match (nominal, self.new.meta.timestamp) {
            (Some(nominal), Some(stamp)) => nominal - stamp > MINOR_VERSION_LAG,
            _ => false,
        }
    }

    /// Decide what, if anything, this action emits.
    ///
    /// # Errors
    /// Returns [`FeatureError`] when either side cannot be rendered. The
    /// caller is expected to log and skip the action.
    pub fn resolve(self, context: &DiffContext) -> Result<ActionOutcome, FeatureError> {
        if self.new.kind() == ElementKind::Relation {
            return Ok(ActionOutcome::Suppressed(Suppression::Relation));
        }
        let minor = self.is_minor_version(context.nominal_timestamp);
        let Self { kind, old, mut new } = self;

        let Some(old) = old else {
            if !new.has_tags() {
                return Ok(ActionOutcome::Suppressed(Suppression::Untagged));
            }
            let feature = build_feature(FeatureLabel::New, &new, None)?;
            return Ok(ActionOutcome::Emit(FeatureCollection {
                action: kind,
                sequence: context.sequence,
                features: vec![feature],
            }));
        };

        let kind = if minor {
            if new.kind() == ElementKind::Way && !attribute_to_latest_node(&mut new) {
                return Ok(ActionOutcome::Suppressed(
                    Suppression::UnattributedMinorVersion,
                ));
            }
            ActionKind::MinorVersion
        } else {
            kind
        };

        if !old.has_tags() && !new.has_tags() {
            return Ok(ActionOutcome::Suppressed(Suppression::Untagged));
        }
        let features = vec![
            build_feature(FeatureLabel::Old, &old, Some(&new))?,
            build_feature(FeatureLabel::New, &new, Some(&old))?,
        ];
        Ok(ActionOutcome::Emit(FeatureCollection {
            action: kind,
            sequence: context.sequence,
            features,
        }))
    }
}

/// Copy edit metadata from the most recently edited node of `way`.
///
/// Ties go to the last of the tied references in way order. Returns
/// `false` when no reference carries a timestamp.
fn attribute_to_latest_node(way: &mut RawElement) -> bool {
    let Some(latest) = way
        .way_nodes()
        .iter()
        .filter_map(|node| Some((node.timestamp()?, node.meta.as_ref()?)))
        .max_by_key(|(stamp, _)| *stamp)
        .map(|(_, meta)| meta.clone())
    else {
        return false;
    };
    way.meta.changeset = latest.changeset;
    way.meta.uid = latest.uid;
    way.meta.user = latest.user;
    way.meta.timestamp = latest.timestamp;
    true
}
