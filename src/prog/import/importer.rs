//! Lazy, memoized bridge from a foreign backend session into a `SymbolSet`.
//!
//! Each foreign handle is imported at most once per session. Composite types are
//! registered in the handle memo before their members are walked, so self-referential
//! shapes like `struct Node { Node *next; }` resolve to the symbol already being built.

use std::ops::Range;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use tracing::{debug, trace};

use crate::error::{SymbolError, SymbolResult};
use crate::prog::symbols::{
    FieldPlacement, GlobalLocation, ModuleInfo, SearchKind, SymbolId, SymbolSet, SymbolSource,
    SymbolTag,
};
use crate::prog::types::{BUILTIN_TYPES, BasicEncoding, PointerKind, TypeRecord};

use super::backend::{
    BackendError, ForeignDataKind, ForeignHandle, ForeignSymbol, ForeignTag, ImportOptions,
    SymbolBackend,
};
use super::memory::MemoryReader;
use super::unwind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImporterState {
    Connected,
    Disconnected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The query was answered before; nothing was asked of the backend.
    AlreadySatisfied,
    Imported { count: usize },
    /// No importer is attached to the set.
    Unavailable,
}

pub struct Importer {
    backend: Box<dyn SymbolBackend>,
    state: ImporterState,
    module: ModuleInfo,
    memory: Arc<dyn MemoryReader>,
    options: ImportOptions,
    name_queries: AHashSet<(SearchKind, String)>,
    offset_queries: AHashSet<(SearchKind, u64)>,
    full_global_import: bool,
    memo: AHashMap<ForeignHandle, SymbolId>,
    enumerations: usize,
}

impl Importer {
    /// Opens a backend session for `module`.
    pub fn connect(
        mut backend: Box<dyn SymbolBackend>,
        module: &ModuleInfo,
        memory: Arc<dyn MemoryReader>,
        options: ImportOptions,
    ) -> SymbolResult<Self> {
        backend.connect(module, &options, Arc::clone(&memory))?;
        debug!(module = %module.name, base = module.base, "importer connected");
        Ok(Self {
            backend,
            state: ImporterState::Connected,
            module: module.clone(),
            memory,
            options,
            name_queries: AHashSet::new(),
            offset_queries: AHashSet::new(),
            full_global_import: false,
            memo: AHashMap::new(),
            enumerations: 0,
        })
    }

    pub fn disconnect(&mut self) {
        if self.state == ImporterState::Connected {
            self.backend.disconnect();
            self.state = ImporterState::Disconnected;
            debug!(module = %self.module.name, "importer disconnected");
        }
    }

    pub fn state(&self) -> ImporterState {
        self.state
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Whether an unfiltered import has already pulled in every top-level symbol.
    pub fn is_fully_imported(&self) -> bool {
        self.full_global_import
    }

    /// Number of enumeration requests sent to the backend.
    pub fn enumerations(&self) -> usize {
        self.enumerations
    }

    fn ensure_connected(&self) -> SymbolResult<()> {
        match self.state {
            ImporterState::Connected => Ok(()),
            ImporterState::Disconnected => Err(BackendError::NotConnected.into()),
        }
    }

    /// Imports top-level symbols of `kind` named `name`, or everything when `name` is `None`.
    pub fn import_for_name_query(
        &mut self,
        set: &mut SymbolSet,
        kind: SearchKind,
        name: Option<&str>,
    ) -> SymbolResult<ImportOutcome> {
        self.ensure_connected()?;
        if self.full_global_import {
            return Ok(ImportOutcome::AlreadySatisfied);
        }
        let key = name.map(|name| (kind, name.to_owned()));
        if let Some(key) = &key
            && self.name_queries.contains(key)
        {
            return Ok(ImportOutcome::AlreadySatisfied);
        }

        self.enumerations += 1;
        let handles = self.backend.enumerate(name, kind)?;
        match key {
            Some(key) => {
                self.name_queries.insert(key);
            }
            None => self.full_global_import = true,
        }
        trace!(?name, ?kind, found = handles.len(), "enumerated foreign symbols");

        let mut count = 0;
        let mut first_error = None;
        for handle in &handles {
            match self.import_top_level(set, *handle, kind) {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(err) => {
                    debug!(?handle, %err, "skipping foreign symbol");
                    first_error.get_or_insert(err);
                }
            }
        }
        // A named request whose every match failed reports why.
        if name.is_some()
            && count == 0
            && let Some(err) = first_error
        {
            return Err(err);
        }
        Ok(ImportOutcome::Imported { count })
    }

    /// Imports whatever the backend knows at module-relative `offset`, falling back to a
    /// function synthesized from unwind data.
    pub fn import_for_offset_query(
        &mut self,
        set: &mut SymbolSet,
        kind: SearchKind,
        offset: u64,
    ) -> SymbolResult<ImportOutcome> {
        self.ensure_connected()?;
        if self.full_global_import
            || self.offset_queries.contains(&(kind, offset))
            || set.symbol_at_offset(offset).is_some()
        {
            return Ok(ImportOutcome::AlreadySatisfied);
        }

        let address = self.module.address_of(offset);
        let mut count = 0;
        let found = self.backend.lookup_by_address(address, kind)?;
        if let Some(handle) = found {
            match self.import_top_level(set, handle, kind) {
                Ok(imported) => count += usize::from(imported),
                Err(err) => debug!(?handle, %err, "skipping foreign symbol"),
            }
        }
        // Unwind data only names code that nothing else names.
        if found.is_none()
            && set.symbol_at_offset(offset).is_none()
            && set.public_at(offset).is_none()
            && kind.contains(SearchKind::FUNCTIONS)
            && self.options.synthesize_from_unwind
            && self.synthesize_function(set, offset)?.is_some()
        {
            count += 1;
        }
        self.offset_queries.insert((kind, offset));
        Ok(ImportOutcome::Imported { count })
    }

    /// Module-relative code extent covering `offset` per the backend's unwind metadata.
    pub(crate) fn function_extent(&mut self, offset: u64) -> SymbolResult<Option<Range<u64>>> {
        self.ensure_connected()?;
        let address = self.module.address_of(offset);
        let Some(extent) = self.backend.unwind_range(address)? else {
            return Ok(None);
        };
        Ok(self.module_range(&extent))
    }

    /// Drops memo entries for a deleted symbol.
    pub(crate) fn forget(&mut self, id: SymbolId) {
        self.memo.retain(|_, imported| *imported != id);
    }

    fn module_range(&self, extent: &Range<u64>) -> Option<Range<u64>> {
        let start = self.module.offset_of(extent.start)?;
        let end = start.checked_add(extent.end.checked_sub(extent.start)?)?;
        Some(start..end)
    }

    fn synthesize_function(&mut self, set: &mut SymbolSet, offset: u64) -> SymbolResult<Option<SymbolId>> {
        let address = self.module.address_of(offset);
        let Some(extent) = self.backend.unwind_range(address)? else {
            return Ok(None);
        };
        let Some(range) = self.module_range(&extent).filter(|range| !range.is_empty()) else {
            debug!(address, "unwind extent outside module");
            return Ok(None);
        };
        if set.ranges().any(|entry| entry.start < range.end && range.start < entry.end) {
            return Ok(None);
        }

        let prefix = &self.options.synthesized_prefix;
        let len = usize::try_from(extent.end - extent.start).unwrap_or(usize::MAX);
        let name = match self.memory.read_memory(extent.start, len) {
            Ok(code) => unwind::hashed_name(prefix, &code),
            Err(err) => {
                debug!(address = extent.start, %err, "code bytes unreadable; naming by offset");
                unwind::offset_name(prefix, range.start)
            }
        };
        let void = set.find_type_by_name("void", true)?;
        let id = set.create_function(&name, void, &[range])?;
        set.mark_source(id, SymbolSource::SYNTHESIZED)?;
        debug!(%name, %id, "synthesized function from unwind data");
        Ok(Some(id))
    }

    fn import_top_level(&mut self, set: &mut SymbolSet, handle: ForeignHandle, kind: SearchKind) -> SymbolResult<bool> {
        if let Some(id) = self.memoized(set, handle) {
            trace!(?handle, %id, "already imported");
            return Ok(false);
        }
        let symbol = self.backend.describe(handle)?;
        let wanted = symbol.tag.search_kind().is_some_and(|category| kind.intersects(category));
        if !wanted || (symbol.tag == ForeignTag::Public && !self.options.import_publics) {
            return Ok(false);
        }
        self.import_described(set, handle, symbol)?;
        Ok(true)
    }

    fn memoized(&mut self, set: &SymbolSet, handle: ForeignHandle) -> Option<SymbolId> {
        let id = *self.memo.get(&handle)?;
        if set.contains(id) {
            return Some(id);
        }
        self.memo.remove(&handle);
        None
    }

    fn remember(&mut self, handle: ForeignHandle, id: SymbolId) -> SymbolId {
        self.memo.insert(handle, id);
        id
    }

    fn import_handle(&mut self, set: &mut SymbolSet, handle: ForeignHandle) -> SymbolResult<SymbolId> {
        if let Some(id) = self.memoized(set, handle) {
            return Ok(id);
        }
        let symbol = self.backend.describe(handle)?;
        self.import_described(set, handle, symbol)
    }

    fn import_described(
        &mut self,
        set: &mut SymbolSet,
        handle: ForeignHandle,
        symbol: ForeignSymbol,
    ) -> SymbolResult<SymbolId> {
        match symbol.tag {
            ForeignTag::BaseType(encoding) => self.import_basic(set, handle, &symbol, encoding),
            ForeignTag::Udt(kind) => {
                if let Some(existing) = self.reuse_named(set, handle, &symbol.name) {
                    return Ok(existing);
                }
                let id = set.create_udt(&symbol.name, kind)?;
                self.remember(handle, id);
                self.import_udt_members(set, handle, id);
                let size = set.type_layout(id)?.bytes;
                if size != symbol.size {
                    debug!(name = %symbol.name, foreign = symbol.size, computed = size, "imported UDT size differs");
                }
                Ok(id)
            }
            ForeignTag::Enum => self.import_enum(set, handle, &symbol),
            ForeignTag::Pointer => {
                let pointee = self.import_base(set, &symbol)?;
                let kind = if symbol.is_reference {
                    PointerKind::Reference
                } else {
                    PointerKind::Standard
                };
                let id = set.create_pointer(pointee, kind)?;
                Ok(self.remember(handle, id))
            }
            ForeignTag::Array => {
                if symbol.dimensions > 1 {
                    return Err(SymbolError::not_implemented(format!(
                        "{}-dimensional arrays",
                        symbol.dimensions
                    )));
                }
                let element = self.import_base(set, &symbol)?;
                let count = match symbol.count {
                    Some(count) => count,
                    None => {
                        let element_size = set.type_layout(element)?.bytes;
                        symbol.size.checked_div(element_size).unwrap_or(0)
                    }
                };
                let id = set.create_array(element, count)?;
                Ok(self.remember(handle, id))
            }
            ForeignTag::Typedef => {
                if let Some(existing) = self.reuse_named(set, handle, &symbol.name) {
                    return Ok(existing);
                }
                let target = self.import_base(set, &symbol)?;
                // The target may have reached this typedef through its own members.
                if let Some(existing) = self.memoized(set, handle) {
                    return Ok(existing);
                }
                let id = set.create_typedef(&symbol.name, target)?;
                Ok(self.remember(handle, id))
            }
            ForeignTag::FunctionType => {
                let id = set.create_function_type(None, &[])?;
                self.remember(handle, id);
                let (return_type, params) = self.import_signature(set, handle, &symbol)?;
                set.set_function_signature(id, return_type, &params)?;
                Ok(id)
            }
            ForeignTag::Data(ForeignDataKind::Global | ForeignDataKind::Static) => {
                self.import_global(set, handle, &symbol)
            }
            ForeignTag::Function => self.import_function(set, handle, &symbol),
            ForeignTag::Public => {
                let offset = self.module_offset(&symbol)?;
                let id = match set.find_public(&symbol.name) {
                    Some(existing) => existing,
                    None => set.create_public(&symbol.name, offset)?,
                };
                Ok(self.remember(handle, id))
            }
            ForeignTag::BaseClass { .. }
            | ForeignTag::FunctionArg
            | ForeignTag::Data(_)
            | ForeignTag::Other(_) => Err(SymbolError::not_implemented(format!(
                "standalone import of {:?} '{}'",
                symbol.tag, symbol.name
            ))),
        }
    }

    fn import_base(&mut self, set: &mut SymbolSet, symbol: &ForeignSymbol) -> SymbolResult<SymbolId> {
        let base = symbol.base_type.ok_or_else(|| {
            SymbolError::invalid(format!("foreign {:?} '{}' has no base type", symbol.tag, symbol.name))
        })?;
        self.import_handle(set, base)
    }

    /// Maps a name collision onto the type that already owns the name.
    fn reuse_named(&mut self, set: &SymbolSet, handle: ForeignHandle, name: &str) -> Option<SymbolId> {
        if name.is_empty() {
            return None;
        }
        let existing = set.lookup_type(name)?;
        trace!(name, %existing, "reusing existing type for foreign symbol");
        Some(self.remember(handle, existing))
    }

    fn module_offset(&self, symbol: &ForeignSymbol) -> SymbolResult<u64> {
        symbol
            .address
            .and_then(|address| self.module.offset_of(address))
            .ok_or_else(|| {
                SymbolError::invalid(format!(
                    "foreign symbol '{}' has no address inside {}",
                    symbol.name, self.module.name
                ))
            })
    }

    fn import_basic(
        &mut self,
        set: &mut SymbolSet,
        handle: ForeignHandle,
        symbol: &ForeignSymbol,
        encoding: BasicEncoding,
    ) -> SymbolResult<SymbolId> {
        let name = if symbol.name.is_empty() {
            BUILTIN_TYPES
                .iter()
                .find(|entry| entry.encoding == encoding && entry.byte_size == symbol.size)
                .map(|entry| entry.name.to_owned())
                .unwrap_or_else(|| format!("__{encoding:?}{}", symbol.size * 8).to_lowercase())
        } else {
            symbol.name.clone()
        };
        if let Some(existing) = self.reuse_named(set, handle, &name) {
            return Ok(existing);
        }
        let id = set.create_basic_type(&name, encoding, symbol.size)?;
        Ok(self.remember(handle, id))
    }

    fn import_udt_members(&mut self, set: &mut SymbolSet, handle: ForeignHandle, owner: SymbolId) {
        let children = match self.backend.children(handle) {
            Ok(children) => children,
            Err(err) => {
                debug!(%owner, %err, "member enumeration failed");
                return;
            }
        };
        for child in children {
            if let Err(err) = self.import_udt_member(set, owner, child) {
                debug!(%owner, ?child, %err, "skipping member");
            }
        }
    }

    fn import_udt_member(&mut self, set: &mut SymbolSet, owner: SymbolId, child: ForeignHandle) -> SymbolResult<()> {
        let member = self.backend.describe(child)?;
        match member.tag {
            ForeignTag::Data(ForeignDataKind::Member) => {
                let ty = self.import_base(set, &member)?;
                let placement = FieldPlacement::Offset(member.offset.unwrap_or(0));
                let id = set.create_field(owner, placement, ty, &member.name)?;
                if member.bit_field.is_some() {
                    set.set_bit_field(id, member.bit_field)?;
                }
            }
            ForeignTag::Data(ForeignDataKind::Constant) => {
                let ty = self.import_base(set, &member)?;
                let value = member.constant.ok_or_else(|| {
                    SymbolError::invalid(format!("constant member '{}' has no value", member.name))
                })?;
                set.create_field(owner, FieldPlacement::Constant(value), ty, &member.name)?;
            }
            ForeignTag::BaseClass { is_virtual: false } => {
                let ty = self.import_base(set, &member)?;
                set.create_base_class(owner, FieldPlacement::Offset(member.offset.unwrap_or(0)), ty)?;
            }
            ForeignTag::BaseClass { is_virtual: true } => {
                return Err(SymbolError::not_implemented("virtual base classes"));
            }
            ForeignTag::Data(ForeignDataKind::Static) => {
                return Err(SymbolError::not_implemented("static data members"));
            }
            other => trace!(?other, name = %member.name, "ignoring member category"),
        }
        Ok(())
    }

    fn import_enum(&mut self, set: &mut SymbolSet, handle: ForeignHandle, symbol: &ForeignSymbol) -> SymbolResult<SymbolId> {
        if let Some(existing) = self.reuse_named(set, handle, &symbol.name) {
            return Ok(existing);
        }
        let underlying = match symbol.base_type {
            Some(base) => self.import_handle(set, base)?,
            None => {
                let fallback = match symbol.size {
                    1 => "signed char",
                    2 => "short",
                    8 => "long long",
                    _ => "int",
                };
                set.find_type_by_name(fallback, true)?
            }
        };
        let id = set.create_enum(&symbol.name, Some(underlying))?;
        self.remember(handle, id);

        let children = match self.backend.children(handle) {
            Ok(children) => children,
            Err(err) => {
                debug!(%id, %err, "enumerant enumeration failed");
                return Ok(id);
            }
        };
        for child in children {
            let result = self.backend.describe(child).map_err(SymbolError::from).and_then(|member| {
                set.create_enumerant(id, &member.name, member.constant).map(|_| ())
            });
            if let Err(err) = result {
                debug!(%id, ?child, %err, "skipping enumerant");
            }
        }
        Ok(id)
    }

    fn import_signature(
        &mut self,
        set: &mut SymbolSet,
        handle: ForeignHandle,
        symbol: &ForeignSymbol,
    ) -> SymbolResult<(Option<SymbolId>, Vec<SymbolId>)> {
        let return_type = match symbol.base_type {
            Some(base) => {
                let id = self.import_handle(set, base)?;
                let is_void = set
                    .get(id)?
                    .as_type()
                    .and_then(|ty| ty.record.as_basic())
                    .is_some_and(|basic| basic.encoding == BasicEncoding::Void);
                (!is_void).then_some(id)
            }
            None => None,
        };
        let mut params = Vec::new();
        for child in self.backend.children(handle)? {
            let arg = self.backend.describe(child)?;
            if arg.tag == ForeignTag::FunctionArg {
                params.push(self.import_base(set, &arg)?);
            }
        }
        Ok((return_type, params))
    }

    fn import_global(&mut self, set: &mut SymbolSet, handle: ForeignHandle, symbol: &ForeignSymbol) -> SymbolResult<SymbolId> {
        if let Some(existing) = self.reuse_top_level(set, handle, &symbol.name, SymbolTag::Data) {
            return Ok(existing);
        }
        let ty = self.import_base(set, symbol)?;
        let location = match (symbol.address, symbol.constant) {
            (None, Some(value)) => GlobalLocation::Constant(value),
            _ => GlobalLocation::ImageOffset(self.module_offset(symbol)?),
        };
        let id = set.create_global(&symbol.name, location, ty)?;
        Ok(self.remember(handle, id))
    }

    fn reuse_top_level(&mut self, set: &SymbolSet, handle: ForeignHandle, name: &str, tag: SymbolTag) -> Option<SymbolId> {
        let existing = set
            .symbol_ids_by_name(name)
            .iter()
            .copied()
            .find(|id| set.get(*id).is_ok_and(|symbol| symbol.tag() == tag))?;
        Some(self.remember(handle, existing))
    }

    fn import_function(&mut self, set: &mut SymbolSet, handle: ForeignHandle, symbol: &ForeignSymbol) -> SymbolResult<SymbolId> {
        if let Some(existing) = self.reuse_top_level(set, handle, &symbol.name, SymbolTag::Function) {
            return Ok(existing);
        }
        let start = self.module_offset(symbol)?;
        let range = start..start.saturating_add(symbol.size);

        let signature = match symbol.base_type {
            Some(base) => Some(self.import_handle(set, base)?),
            None => None,
        };
        let return_type = match signature.and_then(|id| set.get(id).ok()).and_then(|s| s.as_type()) {
            Some(ty) => match &ty.record {
                TypeRecord::Function(function) => function.return_type,
                _ => None,
            },
            None => None,
        };
        let return_type = match return_type {
            Some(ty) => ty,
            None => set.find_type_by_name("void", true)?,
        };

        let ranges: &[Range<u64>] = if range.is_empty() { &[] } else { std::slice::from_ref(&range) };
        let id = set.create_function(&symbol.name, return_type, ranges)?;
        self.remember(handle, id);

        let children = match self.backend.children(handle) {
            Ok(children) => children,
            Err(err) => {
                debug!(%id, %err, "variable enumeration failed");
                return Ok(id);
            }
        };
        for child in children {
            let result = self.backend.describe(child).map_err(SymbolError::from).and_then(|var| {
                let ty = self.import_base(set, &var)?;
                match var.tag {
                    ForeignTag::Data(ForeignDataKind::Parameter) => set.create_parameter(id, ty, &var.name),
                    ForeignTag::Data(ForeignDataKind::Local) => set.create_local(id, ty, &var.name),
                    other => Err(SymbolError::not_implemented(format!("function child {other:?}"))),
                }
            });
            if let Err(err) = result {
                debug!(%id, ?child, %err, "skipping function variable");
            }
        }
        Ok(id)
    }
}

impl Drop for Importer {
    fn drop(&mut self) {
        self.disconnect();
    }
}
