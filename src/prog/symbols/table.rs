//! Symbol graph storage: the id arena plus the name, shape, public, and range indices.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::error::{SymbolError, SymbolResult};
use crate::prog::import::{ImportOptions, ImportOutcome, Importer, MemoryReader, SymbolBackend};
use crate::prog::types::{ArrayType, LayoutSize, PointerKind, TypeRecord, TypeSymbol, builtin};

use super::config::{ModuleInfo, SymbolSetConfig};
use super::id::SymbolId;
use super::range::RangeEntry;
use super::range::RangeIndex;
use super::source::{SearchKind, SymbolSource};
use super::symbol::{Symbol, SymbolData, SymbolTag};

/// Receives cache-flush advisories after committed mutations.
pub trait InvalidationSink {
    fn invalidate(&self, module: &ModuleInfo) -> SymbolResult<()>;
}

/// Shape key for pointer and array types, which are shared rather than duplicated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum DerivedKey {
    Pointer(SymbolId, PointerKind),
    Array(SymbolId, u64),
}

impl DerivedKey {
    pub(crate) fn of(record: &TypeRecord) -> Option<Self> {
        match record {
            TypeRecord::Pointer(pointer) => Some(DerivedKey::Pointer(pointer.pointee, pointer.kind)),
            TypeRecord::Array(array) => Some(DerivedKey::Array(array.element, array.count)),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Modifier {
    Pointer(PointerKind),
    Array(u64),
}

impl Modifier {
    fn key(self, inner: SymbolId) -> DerivedKey {
        match self {
            Modifier::Pointer(kind) => DerivedKey::Pointer(inner, kind),
            Modifier::Array(count) => DerivedKey::Array(inner, count),
        }
    }
}

/// Splits `Foo *[4]` into `Foo` plus the modifiers to apply, innermost first.
fn split_type_name(name: &str) -> (&str, SmallVec<[Modifier; 2]>) {
    let mut rest = name.trim();
    let mut modifiers = SmallVec::<[Modifier; 2]>::new();
    loop {
        if let Some((inner, count)) = ArrayType::parse_suffix(rest) {
            modifiers.push(Modifier::Array(count));
            rest = inner;
            continue;
        }
        match PointerKind::from_suffix(rest) {
            Some((inner, kind)) if !inner.is_empty() => {
                modifiers.push(Modifier::Pointer(kind));
                rest = inner;
            }
            _ => break,
        }
    }
    modifiers.reverse();
    (rest.trim(), modifiers)
}

/// One module's symbol graph. Every entity is created, mutated, and destroyed through here.
pub struct SymbolSet {
    pub(super) module: ModuleInfo,
    pub(super) config: SymbolSetConfig,
    pub(super) entries: Vec<Option<Symbol>>,
    pub(super) live: usize,
    pub(super) by_name: AHashMap<String, SmallVec<[SymbolId; 2]>>,
    pub(super) derived: AHashMap<DerivedKey, SymbolId>,
    pub(super) publics: AHashMap<String, SymbolId>,
    pub(super) publics_by_offset: BTreeMap<u64, SymbolId>,
    pub(super) ranges: RangeIndex,
    pub(super) importer: Option<Importer>,
    pub(super) creation_source: SymbolSource,
    invalidation: Option<Box<dyn InvalidationSink>>,
    invalidation_disabled: bool,
}

impl SymbolSet {
    pub fn new(module: ModuleInfo) -> Self {
        Self::with_config(module, SymbolSetConfig::default())
    }

    pub fn with_config(module: ModuleInfo, config: SymbolSetConfig) -> Self {
        Self {
            module,
            config,
            entries: Vec::new(),
            live: 0,
            by_name: AHashMap::new(),
            derived: AHashMap::new(),
            publics: AHashMap::new(),
            publics_by_offset: BTreeMap::new(),
            ranges: RangeIndex::new(),
            importer: None,
            creation_source: SymbolSource::MANUAL,
            invalidation: None,
            invalidation_disabled: false,
        }
    }

    pub fn module(&self) -> &ModuleInfo {
        &self.module
    }

    pub fn config(&self) -> &SymbolSetConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.entry(id).is_some()
    }

    pub(super) fn entry(&self, id: SymbolId) -> Option<&Symbol> {
        self.entries.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get(&self, id: SymbolId) -> SymbolResult<&Symbol> {
        self.entry(id)
            .ok_or_else(|| SymbolError::not_found(format!("symbol {id}")))
    }

    pub(crate) fn get_mut(&mut self, id: SymbolId) -> SymbolResult<&mut Symbol> {
        self.entries
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| SymbolError::not_found(format!("symbol {id}")))
    }

    /// Resolves a raw id as handed out to hosts.
    pub fn find_symbol_by_id(&self, raw: u64) -> SymbolResult<&Symbol> {
        let id = SymbolId::from_u64(raw)
            .ok_or_else(|| SymbolError::invalid("symbol id zero is reserved"))?;
        self.get(id)
    }

    /// Live symbols in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.entries.iter().filter_map(Option::as_ref)
    }

    pub fn iter_tag(&self, tag: SymbolTag) -> impl Iterator<Item = &Symbol> + '_ {
        self.iter().filter(move |symbol| symbol.tag() == tag)
    }

    /// Looks up a live type, reporting a bad reference as an invalid argument.
    pub(crate) fn expect_type(&self, id: SymbolId, role: &str) -> SymbolResult<&TypeSymbol> {
        self.entry(id)
            .and_then(Symbol::as_type)
            .ok_or_else(|| SymbolError::invalid(format!("{role} {id} is not a live type")))
    }

    pub fn type_layout(&self, id: SymbolId) -> SymbolResult<LayoutSize> {
        self.expect_type(id, "type").map(|ty| ty.layout)
    }

    /// Stores a fully validated symbol and links it under its owner.
    ///
    /// `owner` carries the child position; `None` appends.
    pub(super) fn allocate(
        &mut self,
        name: String,
        data: SymbolData,
        owner: Option<(SymbolId, Option<usize>)>,
    ) -> SymbolResult<SymbolId> {
        let id = SymbolId::from_index(self.entries.len());
        if let Some((owner_id, position)) = owner {
            let parent = self.get_mut(owner_id)?;
            let at = position
                .unwrap_or(parent.children.len())
                .min(parent.children.len());
            parent.children.insert(at, id);
        }
        let mut symbol = Symbol::new(id, name, self.creation_source, data);
        symbol.parent = owner.map(|(owner_id, _)| owner_id);
        self.entries.push(Some(symbol));
        self.live += 1;
        self.index_symbol(id);
        trace!(%id, "allocated symbol");
        Ok(id)
    }

    /// Drops the arena slot; the caller has already unlinked edges and indices.
    pub(super) fn release(&mut self, id: SymbolId) -> Option<Symbol> {
        let symbol = self.entries.get_mut(id.index())?.take()?;
        self.live -= 1;
        Some(symbol)
    }

    pub(super) fn index_symbol(&mut self, id: SymbolId) {
        let Some(symbol) = self.entry(id) else {
            return;
        };
        let mut names = SmallVec::<[String; 2]>::new();
        if symbol.is_name_indexed() {
            names.push(symbol.name.clone());
            if let Some(qualified) = symbol.qualified_name.as_ref().filter(|q| **q != symbol.name) {
                names.push(qualified.clone());
            }
        }
        let derived = symbol.as_type().and_then(|ty| DerivedKey::of(&ty.record));
        let public = match &symbol.data {
            SymbolData::Public(public) => Some((symbol.name.clone(), public.offset)),
            _ => None,
        };

        for name in names {
            let ids = self.by_name.entry(name).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if let Some(key) = derived {
            self.derived.entry(key).or_insert(id);
        }
        if let Some((name, offset)) = public {
            self.publics.insert(name, id);
            self.publics_by_offset.insert(offset, id);
        }
    }

    pub(super) fn unindex_symbol(&mut self, id: SymbolId) {
        let Some(symbol) = self.entry(id) else {
            return;
        };
        let mut names = SmallVec::<[String; 2]>::new();
        names.push(symbol.name.clone());
        if let Some(qualified) = &symbol.qualified_name {
            names.push(qualified.clone());
        }
        let derived = symbol.as_type().and_then(|ty| DerivedKey::of(&ty.record));
        let public = match &symbol.data {
            SymbolData::Public(public) => Some((symbol.name.clone(), public.offset)),
            _ => None,
        };

        for name in names {
            if let Some(ids) = self.by_name.get_mut(&name) {
                ids.retain(|existing| *existing != id);
                if ids.is_empty() {
                    self.by_name.remove(&name);
                }
            }
        }
        if let Some(key) = derived {
            if self.derived.get(&key) == Some(&id) {
                self.derived.remove(&key);
            }
        }
        if let Some((name, offset)) = public {
            if self.publics.get(&name) == Some(&id) {
                self.publics.remove(&name);
            }
            if self.publics_by_offset.get(&offset) == Some(&id) {
                self.publics_by_offset.remove(&offset);
            }
        }
    }

    /// All top-level symbols registered under `name` (plain or qualified).
    pub fn symbol_ids_by_name(&self, name: &str) -> &[SymbolId] {
        self.by_name.get(name).map(|ids| ids.as_slice()).unwrap_or(&[])
    }

    fn lookup_named_type(&self, name: &str) -> Option<SymbolId> {
        self.symbol_ids_by_name(name)
            .iter()
            .copied()
            .find(|id| self.entry(*id).and_then(Symbol::as_type).is_some())
    }

    pub(crate) fn lookup_derived(&self, key: DerivedKey) -> Option<SymbolId> {
        self.derived.get(&key).copied()
    }

    /// Local-only type lookup understanding pointer and array suffixes.
    pub fn lookup_type(&self, name: &str) -> Option<SymbolId> {
        let (base, modifiers) = split_type_name(name);
        let mut current = self.lookup_named_type(base)?;
        for modifier in modifiers {
            current = self.lookup_derived(modifier.key(current))?;
        }
        Some(current)
    }

    /// Resolves a type by name, consulting the importer on a local miss.
    ///
    /// With `allow_auto_create`, a built-in intrinsic name is synthesized on the fly and
    /// missing pointer/array shapes over the resolved base are created.
    pub fn find_type_by_name(&mut self, name: &str, allow_auto_create: bool) -> SymbolResult<SymbolId> {
        let (base, modifiers) = split_type_name(name);
        if base.is_empty() {
            return Err(SymbolError::invalid(format!("'{name}' does not name a type")));
        }

        let mut current = match self.lookup_named_type(base) {
            Some(id) => id,
            None => {
                self.import_quietly_by_name(SearchKind::TYPES, base);
                match self.lookup_named_type(base) {
                    Some(id) => id,
                    None => self.synthesize_builtin(base, allow_auto_create)?,
                }
            }
        };

        for modifier in modifiers {
            current = match self.lookup_derived(modifier.key(current)) {
                Some(id) => id,
                None if allow_auto_create => match modifier {
                    Modifier::Pointer(kind) => self.create_pointer(current, kind)?,
                    Modifier::Array(count) => self.create_array(current, count)?,
                },
                None => return Err(SymbolError::not_found(format!("type '{name}'"))),
            };
        }
        Ok(current)
    }

    fn synthesize_builtin(&mut self, name: &str, allow_auto_create: bool) -> SymbolResult<SymbolId> {
        let entry = builtin(name)
            .filter(|_| allow_auto_create && self.config.auto_create_builtins)
            .ok_or_else(|| SymbolError::not_found(format!("type '{name}'")))?;
        debug!(name, size = entry.byte_size, "synthesizing built-in type");
        self.create_basic_type(entry.name, entry.encoding, entry.byte_size)
    }

    /// Resolves any top-level symbol or public by name, importing on a local miss.
    pub fn get_symbol_id_by_name(&mut self, name: &str) -> SymbolResult<SymbolId> {
        if let Some(id) = self.lookup_symbol(name) {
            return Ok(id);
        }
        self.import_quietly_by_name(SearchKind::all(), name);
        self.lookup_symbol(name)
            .ok_or_else(|| SymbolError::not_found(format!("symbol '{name}'")))
    }

    fn lookup_symbol(&self, name: &str) -> Option<SymbolId> {
        self.symbol_ids_by_name(name)
            .first()
            .copied()
            .or_else(|| self.find_public(name))
    }

    pub fn find_public(&self, name: &str) -> Option<SymbolId> {
        self.publics.get(name).copied()
    }

    pub fn publics(&self) -> impl Iterator<Item = (u64, SymbolId)> + '_ {
        self.publics_by_offset.iter().map(|(&offset, &id)| (offset, id))
    }

    /// Adds an extra `[start, end)` range for a data or function symbol.
    pub fn add_symbol_range(&mut self, start: u64, end: u64, id: SymbolId) -> SymbolResult<()> {
        match self.get(id)?.tag() {
            SymbolTag::Data | SymbolTag::Function => {}
            other => {
                return Err(SymbolError::invalid(format!(
                    "{id} is a {other:?}; only data and functions own ranges"
                )));
            }
        }
        self.ranges.insert(start..end, id)?;
        self.signal_invalidation();
        Ok(())
    }

    pub fn remove_symbol_range(&mut self, start: u64, end: u64, id: SymbolId) -> SymbolResult<()> {
        if !self.ranges.remove(&(start..end), id) {
            return Err(SymbolError::not_found(format!(
                "range 0x{start:X}..0x{end:X} owned by {id}"
            )));
        }
        self.signal_invalidation();
        Ok(())
    }

    /// Local-only view of the range index.
    pub fn symbol_at_offset(&self, offset: u64) -> Option<RangeEntry> {
        self.ranges.find(offset)
    }

    /// The public registered exactly at `offset`, if any.
    pub fn public_at(&self, offset: u64) -> Option<SymbolId> {
        self.publics_by_offset.get(&offset).copied()
    }

    pub fn ranges(&self) -> impl Iterator<Item = RangeEntry> + '_ {
        self.ranges.iter()
    }

    fn resolve_offset(&self, offset: u64) -> Option<(SymbolId, u64)> {
        if let Some(entry) = self.ranges.find(offset) {
            return Some((entry.id, offset - entry.start));
        }
        self.publics_by_offset
            .range(..=offset)
            .next_back()
            .map(|(&start, &id)| (id, offset - start))
    }

    /// Returns the symbol covering `offset` and the displacement into it.
    ///
    /// Ranged symbols win over publics; the nearest preceding public is the fallback.
    pub fn find_symbol_at_offset(&mut self, offset: u64) -> SymbolResult<(SymbolId, u64)> {
        if let Some(hit) = self.ranges.find(offset) {
            return Ok((hit.id, offset - hit.start));
        }
        self.import_quietly_by_offset(SearchKind::ADDRESSABLE, offset);
        self.resolve_offset(offset)
            .ok_or_else(|| SymbolError::not_found(format!("no symbol at offset 0x{offset:X}")))
    }

    pub fn set_invalidation_sink(&mut self, sink: Box<dyn InvalidationSink>) {
        self.invalidation = Some(sink);
    }

    pub fn is_invalidation_disabled(&self) -> bool {
        self.invalidation_disabled
    }

    /// Sets the disable-invalidation flag and returns its previous value.
    pub fn set_invalidation_disabled(&mut self, disabled: bool) -> bool {
        std::mem::replace(&mut self.invalidation_disabled, disabled)
    }

    pub(crate) fn signal_invalidation(&self) {
        let Some(sink) = &self.invalidation else {
            return;
        };
        if self.invalidation_disabled {
            trace!(module = %self.module.name, "invalidation suppressed");
            return;
        }
        if let Err(err) = sink.invalidate(&self.module) {
            warn!(module = %self.module.name, %err, "invalidation sink failed");
        }
    }

    /// Connects a foreign backend for this module and attaches the resulting importer.
    pub fn connect_importer(
        &mut self,
        backend: Box<dyn SymbolBackend>,
        memory: Arc<dyn MemoryReader>,
        options: ImportOptions,
    ) -> SymbolResult<()> {
        let importer = Importer::connect(backend, &self.module, memory, options)?;
        if let Some(previous) = self.importer.replace(importer) {
            debug!(module = %self.module.name, "replacing attached importer");
            drop(previous);
        }
        Ok(())
    }

    pub fn attach_importer(&mut self, importer: Importer) -> Option<Importer> {
        self.importer.replace(importer)
    }

    /// Detaches the importer, disconnecting its backend session.
    pub fn detach_importer(&mut self) -> Option<Importer> {
        let mut importer = self.importer.take()?;
        importer.disconnect();
        Some(importer)
    }

    pub fn importer(&self) -> Option<&Importer> {
        self.importer.as_ref()
    }

    pub fn import_for_name_query(
        &mut self,
        kind: SearchKind,
        name: Option<&str>,
    ) -> SymbolResult<ImportOutcome> {
        self.with_importer(|importer, set| importer.import_for_name_query(set, kind, name))
            .unwrap_or(Ok(ImportOutcome::Unavailable))
    }

    pub fn import_for_offset_query(
        &mut self,
        kind: SearchKind,
        offset: u64,
    ) -> SymbolResult<ImportOutcome> {
        self.with_importer(|importer, set| importer.import_for_offset_query(set, kind, offset))
            .unwrap_or(Ok(ImportOutcome::Unavailable))
    }

    /// Runs an import with the importer detached from `self`, invalidation suppressed,
    /// and new symbols tagged as imported. A nested lookup sees no importer.
    ///
    /// Returns `None` when no importer is attached (or one is already running).
    pub(crate) fn with_importer<T, F>(&mut self, run: F) -> Option<SymbolResult<T>>
    where
        F: FnOnce(&mut Importer, &mut SymbolSet) -> SymbolResult<T>,
    {
        let mut importer = self.importer.take()?;
        let previous_flag = self.set_invalidation_disabled(true);
        let previous_source = std::mem::replace(&mut self.creation_source, SymbolSource::IMPORTED);
        let result = run(&mut importer, self);
        self.creation_source = previous_source;
        self.set_invalidation_disabled(previous_flag);
        self.importer = Some(importer);
        Some(result)
    }

    fn import_quietly_by_name(&mut self, kind: SearchKind, name: &str) {
        if let Err(err) = self.import_for_name_query(kind, Some(name)) {
            debug!(name, %err, "import for name query failed");
        }
    }

    fn import_quietly_by_offset(&mut self, kind: SearchKind, offset: u64) {
        if let Err(err) = self.import_for_offset_query(kind, offset) {
            debug!(offset, %err, "import for offset query failed");
        }
    }

    pub(crate) fn mark_source(&mut self, id: SymbolId, source: SymbolSource) -> SymbolResult<()> {
        self.get_mut(id)?.source |= source;
        Ok(())
    }
}

impl fmt::Debug for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolSet")
            .field("module", &self.module)
            .field("symbols", &self.live)
            .field("ranges", &self.ranges.len())
            .field("importer", &self.importer.is_some())
            .finish()
    }
}
