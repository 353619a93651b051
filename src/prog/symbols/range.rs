//! Interval index from module-relative byte ranges to the data or function symbol covering them.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::error::{SymbolError, SymbolResult};

use super::id::SymbolId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeEntry {
    pub start: u64,
    pub end: u64,
    pub id: SymbolId,
}

impl RangeEntry {
    pub fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn as_range(&self) -> Range<u64> {
        self.start..self.end
    }
}

/// Half-open, non-overlapping ranges keyed by start offset.
#[derive(Debug, Default)]
pub struct RangeIndex {
    by_start: BTreeMap<u64, (u64, SymbolId)>,
}

impl RangeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }

    pub fn insert(&mut self, range: Range<u64>, id: SymbolId) -> SymbolResult<()> {
        if range.start >= range.end {
            return Err(SymbolError::invalid(format!(
                "range 0x{:X}..0x{:X} for {id} is empty",
                range.start, range.end
            )));
        }
        if let Some(existing) = self.overlapping(&range) {
            return Err(SymbolError::invalid(format!(
                "range 0x{:X}..0x{:X} for {id} overlaps {} at 0x{:X}..0x{:X}",
                range.start, range.end, existing.id, existing.start, existing.end
            )));
        }
        self.by_start.insert(range.start, (range.end, id));
        Ok(())
    }

    /// Removes the exact `[start, end)` entry owned by `id`; returns whether it existed.
    pub fn remove(&mut self, range: &Range<u64>, id: SymbolId) -> bool {
        match self.by_start.get(&range.start) {
            Some(&(end, owner)) if end == range.end && owner == id => {
                self.by_start.remove(&range.start);
                true
            }
            _ => false,
        }
    }

    /// Drops every entry owned by `id`; returns how many were removed.
    pub fn remove_owner(&mut self, id: SymbolId) -> usize {
        let before = self.by_start.len();
        self.by_start.retain(|_, (_, owner)| *owner != id);
        before - self.by_start.len()
    }

    pub fn find(&self, offset: u64) -> Option<RangeEntry> {
        let (&start, &(end, id)) = self.by_start.range(..=offset).next_back()?;
        let entry = RangeEntry { start, end, id };
        entry.contains(offset).then_some(entry)
    }

    pub fn overlapping(&self, range: &Range<u64>) -> Option<RangeEntry> {
        let (&start, &(end, id)) = self.by_start.range(..range.end).next_back()?;
        (end > range.start).then_some(RangeEntry { start, end, id })
    }

    pub fn iter(&self) -> impl Iterator<Item = RangeEntry> + '_ {
        self.by_start
            .iter()
            .map(|(&start, &(end, id))| RangeEntry { start, end, id })
    }
}
