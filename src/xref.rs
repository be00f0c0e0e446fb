use std::cell::{Cell, OnceCell};
use std::collections::BTreeMap;

use crate::Object;

/// Cross reference table of one loaded document.
///
/// Entries are created while the xref sections (or the full-file scan) are read
/// and never removed. The full-file scan may replace entries whose offsets turn
/// out to be wrong. The only state that changes afterwards is each entry's
/// resolution cache.
#[derive(Debug, Default)]
pub struct Xref<'a> {
    entries: BTreeMap<u32, XrefEntry<'a>>,
    /// Value of `/Size` in the newest trailer, 0 when missing.
    pub size: u32,
}

pub struct XrefEntry<'a> {
    /// Byte offset of the object header, -1 when unknown.
    pub offset: i64,
    pub generation: u32,
    pub freed: bool,
    pub(crate) resolved: OnceCell<&'a Object<'a>>,
    pub(crate) resolving: Cell<bool>,
    /// Reading the object at `offset` failed once; it is not parsed again.
    pub(crate) failed: Cell<bool>,
}

impl<'a> XrefEntry<'a> {
    pub(crate) fn new(offset: i64, generation: u32, freed: bool) -> XrefEntry<'a> {
        XrefEntry {
            offset,
            generation,
            freed,
            resolved: OnceCell::new(),
            resolving: Cell::new(false),
            failed: Cell::new(false),
        }
    }

    /// The entry names a location an object can be read from.
    pub fn is_in_use(&self) -> bool {
        !self.freed && self.offset >= 0
    }

    /// Object cached by an earlier resolution, if any.
    pub fn resolved(&self) -> Option<&'a Object<'a>> {
        self.resolved.get().copied()
    }

    /// Reading the object at this entry's offset has failed.
    pub fn is_unreadable(&self) -> bool {
        self.failed.get()
    }
}

impl std::fmt::Debug for XrefEntry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XrefEntry")
            .field("offset", &self.offset)
            .field("generation", &self.generation)
            .field("freed", &self.freed)
            .field("resolved", &self.resolved.get().is_some())
            .field("failed", &self.failed.get())
            .finish()
    }
}

impl<'a> Xref<'a> {
    pub fn new() -> Xref<'a> {
        Xref::default()
    }

    pub fn get(&self, id: u32) -> Option<&XrefEntry<'a>> {
        self.entries.get(&id)
    }

    /// Record an entry unless `id` already has one.
    ///
    /// Sections are read from the newest backwards, so the first definition seen
    /// is the one that counts. Returns whether the entry was inserted.
    pub(crate) fn insert_if_absent(&mut self, id: u32, entry: XrefEntry<'a>) -> bool {
        match self.entries.entry(id) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Record an entry, dropping any previous one for `id`.
    pub(crate) fn replace(&mut self, id: u32, entry: XrefEntry<'a>) {
        self.entries.insert(id, entry);
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Highest object number in the table.
    pub fn max_id(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &XrefEntry<'a>)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Ids of entries that can be read, in ascending order.
    pub fn in_use_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.iter().filter(|(_, entry)| entry.is_in_use()).map(|(id, _)| id)
    }
}
