//! Position-based cursors over the symbol graph.
//!
//! Cursors hold a container id plus a position rather than borrowing the set, and re-resolve
//! the live child list on every `next`, so the graph may be mutated between steps.

use crate::error::{SymbolError, SymbolResult};
use crate::prog::types::TypeKind;

use super::id::SymbolId;
use super::source::SymbolSource;
use super::symbol::{Symbol, SymbolTag};
use super::table::SymbolSet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Filter {
    tag: Option<SymbolTag>,
    type_kind: Option<TypeKind>,
    source: Option<SymbolSource>,
}

impl Filter {
    fn matches(&self, symbol: &Symbol) -> bool {
        if self.tag.is_some_and(|tag| symbol.tag() != tag) {
            return false;
        }
        if let Some(kind) = self.type_kind
            && symbol.as_type().map(|ty| ty.kind()) != Some(kind)
        {
            return false;
        }
        if self.source.is_some_and(|source| !symbol.source().intersects(source)) {
            return false;
        }
        true
    }
}

/// Walks the children of one container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildCursor {
    container: SymbolId,
    position: usize,
    filter: Filter,
}

impl ChildCursor {
    pub fn new(container: SymbolId) -> Self {
        Self {
            container,
            position: 0,
            filter: Filter::default(),
        }
    }

    pub fn tag(mut self, tag: SymbolTag) -> Self {
        self.filter.tag = Some(tag);
        self
    }

    pub fn container(&self) -> SymbolId {
        self.container
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Next matching child, or `None` at the end. Fails if the container was deleted.
    pub fn next(&mut self, set: &SymbolSet) -> SymbolResult<Option<SymbolId>> {
        let container = set.get(self.container)?;
        while let Some(&child) = container.children.get(self.position) {
            self.position += 1;
            let symbol = set.get(child).map_err(|_| {
                SymbolError::unexpected(format!("child {child} of {} is missing", self.container))
            })?;
            if self.filter.matches(symbol) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }
}

/// Walks every live symbol of the set in id order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolCursor {
    next_index: usize,
    filter: Filter,
}

impl SymbolCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: SymbolTag) -> Self {
        self.filter.tag = Some(tag);
        self
    }

    pub fn type_kind(mut self, kind: TypeKind) -> Self {
        self.filter.tag = Some(SymbolTag::Type);
        self.filter.type_kind = Some(kind);
        self
    }

    pub fn source(mut self, source: SymbolSource) -> Self {
        self.filter.source = Some(source);
        self
    }

    pub fn next(&mut self, set: &SymbolSet) -> Option<SymbolId> {
        while let Some(slot) = set.entries.get(self.next_index) {
            self.next_index += 1;
            if let Some(symbol) = slot
                && self.filter.matches(symbol)
            {
                return Some(symbol.id);
            }
        }
        None
    }

    /// Drains the remaining matches into a vector.
    pub fn collect(mut self, set: &SymbolSet) -> Vec<SymbolId> {
        let mut ids = Vec::new();
        while let Some(id) = self.next(set) {
            ids.push(id);
        }
        ids
    }
}
