//! Backend answering from a prebuilt table of foreign symbols.
//!
//! Hosts that already decoded debug information elsewhere can feed it through the same
//! lazy import path as a live debug-info session.

use std::ops::Range;
use std::sync::Arc;

use tracing::trace;

use crate::prog::symbols::{ModuleInfo, SearchKind};

use super::backend::{
    BackendError, BackendResult, ForeignHandle, ForeignSymbol, ForeignTag, ImportOptions,
    SymbolBackend,
};
use super::memory::MemoryReader;

#[derive(Clone, Debug)]
struct TableEntry {
    symbol: ForeignSymbol,
    children: Vec<ForeignHandle>,
    top_level: bool,
}

#[derive(Clone, Debug, Default)]
pub struct StaticBackend {
    entries: Vec<TableEntry>,
    unwind: Vec<Range<u64>>,
    connected: bool,
}

impl StaticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, symbol: ForeignSymbol, top_level: bool) -> ForeignHandle {
        let handle = ForeignHandle(self.entries.len() as u32);
        self.entries.push(TableEntry {
            symbol,
            children: Vec::new(),
            top_level,
        });
        handle
    }

    /// Adds a symbol reachable by enumeration and address lookup.
    pub fn add(&mut self, symbol: ForeignSymbol) -> ForeignHandle {
        self.push(symbol, true)
    }

    /// Adds a member, enumerant, argument, or variable under `parent`.
    pub fn add_child(&mut self, parent: ForeignHandle, symbol: ForeignSymbol) -> ForeignHandle {
        let handle = self.push(symbol, false);
        if let Some(entry) = self.entries.get_mut(parent.0 as usize) {
            entry.children.push(handle);
        }
        handle
    }

    /// Records an absolute code extent from unwind metadata.
    pub fn add_unwind_range(&mut self, range: Range<u64>) {
        self.unwind.push(range);
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn entry(&self, handle: ForeignHandle) -> BackendResult<&TableEntry> {
        if !self.connected {
            return Err(BackendError::NotConnected);
        }
        self.entries
            .get(handle.0 as usize)
            .ok_or_else(|| BackendError::Failed(format!("unknown handle {}", handle.0)))
    }

    fn top_level(&self, kind: SearchKind) -> impl Iterator<Item = (ForeignHandle, &ForeignSymbol)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.top_level)
            .filter(move |(_, entry)| {
                entry
                    .symbol
                    .tag
                    .search_kind()
                    .is_some_and(|category| kind.intersects(category))
            })
            .map(|(index, entry)| (ForeignHandle(index as u32), &entry.symbol))
    }
}

/// `*` at the end of a mask matches any suffix; otherwise names compare exactly.
fn mask_matches(mask: &str, name: &str) -> bool {
    match mask.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => mask == name,
    }
}

impl SymbolBackend for StaticBackend {
    fn connect(
        &mut self,
        module: &ModuleInfo,
        _options: &ImportOptions,
        _memory: Arc<dyn MemoryReader>,
    ) -> BackendResult<()> {
        trace!(module = %module.name, symbols = self.entries.len(), "table backend connected");
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn enumerate(&mut self, mask: Option<&str>, kind: SearchKind) -> BackendResult<Vec<ForeignHandle>> {
        if !self.connected {
            return Err(BackendError::NotConnected);
        }
        Ok(self
            .top_level(kind)
            .filter(|(_, symbol)| mask.is_none_or(|mask| mask_matches(mask, &symbol.name)))
            .map(|(handle, _)| handle)
            .collect())
    }

    fn lookup_by_address(&mut self, address: u64, kind: SearchKind) -> BackendResult<Option<ForeignHandle>> {
        if !self.connected {
            return Err(BackendError::NotConnected);
        }
        let covering = |symbol: &ForeignSymbol| {
            symbol
                .address
                .is_some_and(|start| start <= address && address - start < symbol.size.max(1))
        };
        // Ranged data and code win over a public at the same address.
        let best = self
            .top_level(kind)
            .filter(|(_, symbol)| covering(symbol))
            .min_by_key(|(_, symbol)| symbol.tag == ForeignTag::Public)
            .map(|(handle, _)| handle);
        Ok(best)
    }

    fn describe(&mut self, handle: ForeignHandle) -> BackendResult<ForeignSymbol> {
        Ok(self.entry(handle)?.symbol.clone())
    }

    fn children(&mut self, handle: ForeignHandle) -> BackendResult<Vec<ForeignHandle>> {
        Ok(self.entry(handle)?.children.clone())
    }

    fn unwind_range(&mut self, address: u64) -> BackendResult<Option<Range<u64>>> {
        if !self.connected {
            return Err(BackendError::NotConnected);
        }
        Ok(self.unwind.iter().find(|range| range.contains(&address)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prog::import::NoMemory;
    use crate::prog::types::{BasicEncoding, UdtKind};

    fn connected(backend: &mut StaticBackend) {
        backend
            .connect(&ModuleInfo::new("app", 0, 0), &ImportOptions::default(), Arc::new(NoMemory))
            .expect("connect");
    }

    #[test]
    fn enumerate_filters_by_kind_and_mask() {
        let mut backend = StaticBackend::new();
        let foo = backend.add(ForeignSymbol::new(ForeignTag::Udt(UdtKind::Struct), "Foo"));
        let foobar = backend.add(ForeignSymbol::new(ForeignTag::Udt(UdtKind::Struct), "FooBar"));
        backend.add(ForeignSymbol::new(ForeignTag::Function, "Foo").address(0x10).size(4));
        backend.add_child(foo, ForeignSymbol::new(ForeignTag::BaseType(BasicEncoding::Signed), "Foo"));
        connected(&mut backend);

        assert_eq!(backend.enumerate(Some("Foo"), SearchKind::TYPES).expect("enumerate"), vec![foo]);
        assert_eq!(
            backend.enumerate(Some("Foo*"), SearchKind::TYPES).expect("enumerate"),
            vec![foo, foobar],
            "trailing star matches prefixes; children are never top level"
        );
        assert_eq!(backend.enumerate(None, SearchKind::all()).expect("enumerate").len(), 3);
    }

    #[test]
    fn address_lookup_prefers_ranged_symbols() {
        let mut backend = StaticBackend::new();
        backend.add(ForeignSymbol::new(ForeignTag::Public, "_start").address(0x100));
        let function = backend.add(ForeignSymbol::new(ForeignTag::Function, "start").address(0x100).size(8));
        connected(&mut backend);
        assert_eq!(
            backend.lookup_by_address(0x104, SearchKind::ADDRESSABLE).expect("lookup"),
            Some(function)
        );
        assert_eq!(backend.lookup_by_address(0x108, SearchKind::ADDRESSABLE).expect("lookup"), None);
    }

    #[test]
    fn queries_require_a_session() {
        let mut backend = StaticBackend::new();
        let handle = backend.add(ForeignSymbol::new(ForeignTag::Enum, "E"));
        assert_eq!(backend.describe(handle), Err(BackendError::NotConnected));
        connected(&mut backend);
        assert!(backend.is_connected());
        backend.disconnect();
        assert_eq!(backend.enumerate(None, SearchKind::TYPES), Err(BackendError::NotConnected));
    }
}
