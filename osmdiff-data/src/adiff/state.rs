//! Per-payload caches and the in-progress action.

use std::collections::HashMap;

use log::warn;
use osmdiff_core::{ActionKind, ActionRecord, ElementKind, RawElement, Slot, Slotted};

type ElementCache = Slotted<HashMap<i64, RawElement>>;

/// Elements seen in the current `<osm>` block, keyed by id.
#[derive(Debug, Default)]
pub(super) struct PayloadCache {
    nodes: ElementCache,
    ways: ElementCache,
    relations: ElementCache,
}

impl PayloadCache {
    fn slot_mut(&mut self, kind: ElementKind) -> &mut ElementCache {
        match kind {
            ElementKind::Node => &mut self.nodes,
            ElementKind::Way => &mut self.ways,
            ElementKind::Relation => &mut self.relations,
        }
    }

    /// Remember `element` under `slot`, replacing any earlier version.
    pub(super) fn register(&mut self, slot: Slot, element: RawElement) {
        self.slot_mut(element.kind())
            .get_mut(slot)
            .insert(element.id, element);
    }

    /// Resolve a way's node stubs against the cached nodes for `slot`.
    ///
    /// A new-side reference to a node deleted in this payload resolves
    /// against the old version so its position stays known. References
    /// to nodes outside the payload keep their inline coordinates.
    pub(super) fn resolve_way_nodes(&self, slot: Slot, way: &mut RawElement) {
        let Some(nodes) = way.way_nodes_mut() else {
            return;
        };
        for stub in nodes.iter_mut() {
            if let Some(node) = self.lookup_node(slot, stub.id) {
                *stub = stub.resolved_with(node);
            }
        }
    }

    fn lookup_node(&self, slot: Slot, id: i64) -> Option<&RawElement> {
        let node = self.nodes.get(slot).get(&id)?;
        if slot == Slot::New && !node.visible {
            return self.nodes.get(Slot::Old).get(&id).or(Some(node));
        }
        Some(node)
    }

    #[cfg(test)]
    pub(super) fn contains(&self, kind: ElementKind, slot: Slot, id: i64) -> bool {
        match kind {
            ElementKind::Node => &self.nodes,
            ElementKind::Way => &self.ways,
            ElementKind::Relation => &self.relations,
        }
        .get(slot)
        .contains_key(&id)
    }
}

/// The `<action>` block currently being read.
#[derive(Debug, Default)]
pub(super) struct ActionState {
    kind: Option<ActionKind>,
    slot: Option<Slot>,
    elements: Slotted<Option<RawElement>>,
}

impl ActionState {
    /// Open an action of the given `type` attribute.
    pub(super) fn open(type_attribute: Option<&str>) -> Self {
        let kind = type_attribute.and_then(ActionKind::from_attribute);
        Self {
            kind,
            slot: (kind == Some(ActionKind::Create)).then_some(Slot::New),
            elements: Slotted::default(),
        }
    }

    pub(super) const fn slot(&self) -> Option<Slot> {
        self.slot
    }

    pub(super) const fn select(&mut self, slot: Slot) {
        self.slot = Some(slot);
    }

    /// Start a fresh element in the active slot.
    pub(super) fn begin(&mut self, element: RawElement) {
        if let Some(slot) = self.slot {
            *self.elements.get_mut(slot) = Some(element);
        }
    }

    /// Element under construction in the active slot.
    pub(super) fn current_mut(&mut self) -> Option<&mut RawElement> {
        self.elements.get_mut(self.slot?).as_mut()
    }

    pub(super) fn current(&self) -> Option<&RawElement> {
        self.elements.get(self.slot?).as_ref()
    }

    /// Pair the collected elements into a record.
    ///
    /// Returns `None`, logging why, when the block lacked a usable type or
    /// a new-side element.
    pub(super) fn into_record(self) -> Option<ActionRecord> {
        let Some(kind) = self.kind else {
            warn!("skipping action without a recognised type");
            return None;
        };
        let Slotted { old, new: built } = self.elements;
        let Some(new) = built else {
            warn!("skipping {} action without a new element", kind.as_str());
            return None;
        };
        Some(ActionRecord { kind, old, new })
    }
}
