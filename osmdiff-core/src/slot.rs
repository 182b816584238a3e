//! The old/new pairing used throughout an action block.

/// Which side of an action an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// State before the edit.
    Old,
    /// State after the edit.
    New,
}

impl Slot {
    /// Map an `<old>`/`<new>` element name onto a slot.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "old" => Some(Self::Old),
            "new" => Some(Self::New),
            _ => None,
        }
    }
}

/// A value held once per [`Slot`], addressed by pattern match.
///
/// # Examples
/// ```
/// use osmdiff_core::{Slot, Slotted};
///
/// let mut pair: Slotted<Vec<u8>> = Slotted::default();
/// pair.get_mut(Slot::New).push(1);
/// assert!(pair.get(Slot::Old).is_empty());
/// assert_eq!(pair.get(Slot::New), &vec![1]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slotted<T> {
    /// Value for the pre-edit side.
    pub old: T,
    /// Value for the post-edit side.
    pub new: T,
}

impl<T> Slotted<T> {
    /// Borrow the value for `slot`.
    pub const fn get(&self, slot: Slot) -> &T {
        match slot {
            Slot::Old => &self.old,
            Slot::New => &self.new,
        }
    }

    /// Mutably borrow the value for `slot`.
    pub const fn get_mut(&mut self, slot: Slot) -> &mut T {
        match slot {
            Slot::Old => &mut self.old,
            Slot::New => &mut self.new,
        }
    }
}
