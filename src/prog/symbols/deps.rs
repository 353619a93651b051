//! Dependency edges and the change-notification cascade that keeps layout current.
//!
//! Edges run from a referenced type to the symbol using it, and from a member to its
//! owner. Notifying a symbol recomputes it and then walks its dependents.

use std::ops::Range;

use ahash::AHashSet;
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::error::{SymbolError, SymbolResult};
use crate::prog::types::{
    LayoutSize, MemberSlot, TypeRecord, UdtKind, VariantPacking, layout_enum, layout_udt,
};

use super::id::SymbolId;
use super::symbol::{FieldPlacement, GlobalLocation, PositionalSymbol, SymbolData};
use super::table::SymbolSet;

enum Recompute {
    Nothing,
    Udt(UdtKind),
    Enum { underlying: SymbolId, packing: VariantPacking },
    Array { element: SymbolId, count: u64 },
    Typedef(SymbolId),
    Global,
    Function,
}

impl SymbolSet {
    /// Edge sources for `id`: everything that must notify it when changed.
    fn edge_sources(&self, id: SymbolId) -> SmallVec<[SymbolId; 2]> {
        let Some(symbol) = self.entry(id) else {
            return SmallVec::new();
        };
        let mut sources = SmallVec::new();
        match &symbol.data {
            SymbolData::Type(ty) => match &ty.record {
                TypeRecord::Array(array) => sources.push(array.element),
                TypeRecord::Typedef(typedef) => sources.push(typedef.target),
                TypeRecord::Enum(enum_ty) => sources.push(enum_ty.underlying),
                TypeRecord::Basic(_)
                | TypeRecord::Udt(_)
                | TypeRecord::Pointer(_)
                | TypeRecord::Function(_) => {}
            },
            SymbolData::Field(pos) | SymbolData::BaseClass(pos) => sources.push(pos.ty),
            SymbolData::Global(global) => sources.push(global.ty),
            SymbolData::Parameter(var) | SymbolData::Local(var) => sources.push(var.ty),
            SymbolData::Function(_) | SymbolData::Public(_) => {}
        }
        sources
    }

    fn owner_edge(&self, id: SymbolId) -> Option<SymbolId> {
        let symbol = self.entry(id)?;
        match symbol.data {
            SymbolData::Field(_)
            | SymbolData::BaseClass(_)
            | SymbolData::Parameter(_)
            | SymbolData::Local(_) => symbol.parent,
            _ => None,
        }
    }

    pub(super) fn add_dependent(&mut self, on: SymbolId, dependent: SymbolId) -> SymbolResult<()> {
        let target = self.get_mut(on)?;
        if !target.dependents.contains(&dependent) {
            target.dependents.push(dependent);
        }
        Ok(())
    }

    pub(super) fn remove_dependent(&mut self, on: SymbolId, dependent: SymbolId) {
        if let Ok(target) = self.get_mut(on) {
            target.dependents.retain(|existing| *existing != dependent);
        }
    }

    /// Installs the type-to-user and member-to-owner edges for a freshly stored symbol.
    pub(super) fn install_edges(&mut self, id: SymbolId) -> SymbolResult<()> {
        for source in self.edge_sources(id) {
            self.add_dependent(source, id)?;
        }
        if let Some(owner) = self.owner_edge(id) {
            self.add_dependent(id, owner)?;
        }
        Ok(())
    }

    pub(super) fn remove_edges(&mut self, id: SymbolId) {
        for source in self.edge_sources(id) {
            self.remove_dependent(source, id);
        }
        if let Some(owner) = self.owner_edge(id) {
            self.remove_dependent(id, owner);
        }
    }

    /// Recomputes `id` and everything reachable through its dependents.
    ///
    /// Each reachable symbol is recomputed once, after every symbol it depends on within the
    /// cascade. Failures inside the cascade are logged, never returned; only an unknown `id`
    /// errors.
    pub fn notify_dependent_change(&mut self, id: SymbolId) -> SymbolResult<()> {
        self.get(id)?;
        for id in self.cascade_order(id) {
            if let Err(err) = self.recompute(id) {
                warn!(%id, %err, "recompute failed during dependency cascade");
            }
        }
        Ok(())
    }

    /// Reverse post-order over the dependents reachable from `root`. Edges closing a cycle
    /// are dropped.
    fn cascade_order(&self, root: SymbolId) -> Vec<SymbolId> {
        let mut visited = AHashSet::new();
        let mut order = Vec::new();
        self.collect_dependents(root, &mut visited, &mut order);
        order.reverse();
        order
    }

    fn collect_dependents(&self, id: SymbolId, visited: &mut AHashSet<SymbolId>, order: &mut Vec<SymbolId>) {
        if !visited.insert(id) {
            trace!(%id, "dependency already scheduled");
            return;
        }
        if let Some(symbol) = self.entry(id) {
            for dependent in symbol.dependents.iter() {
                self.collect_dependents(*dependent, visited, order);
            }
        }
        order.push(id);
    }

    fn recompute(&mut self, id: SymbolId) -> SymbolResult<()> {
        let plan = match &self.get(id)?.data {
            SymbolData::Type(ty) => match &ty.record {
                TypeRecord::Udt(udt) => Recompute::Udt(udt.kind),
                TypeRecord::Enum(enum_ty) => Recompute::Enum {
                    underlying: enum_ty.underlying,
                    packing: enum_ty.packing,
                },
                TypeRecord::Array(array) => Recompute::Array {
                    element: array.element,
                    count: array.count,
                },
                TypeRecord::Typedef(typedef) => Recompute::Typedef(typedef.target),
                TypeRecord::Basic(_) | TypeRecord::Pointer(_) | TypeRecord::Function(_) => {
                    Recompute::Nothing
                }
            },
            SymbolData::Global(_) => Recompute::Global,
            SymbolData::Function(_) => Recompute::Function,
            SymbolData::Field(_)
            | SymbolData::BaseClass(_)
            | SymbolData::Parameter(_)
            | SymbolData::Local(_)
            | SymbolData::Public(_) => Recompute::Nothing,
        };

        match plan {
            Recompute::Nothing => Ok(()),
            Recompute::Udt(kind) => self.relayout_udt(id, kind),
            Recompute::Enum { underlying, packing } => self.relayout_enum(id, underlying, packing),
            Recompute::Array { element, count } => {
                let element = self.type_layout(element)?;
                let bytes = element.bytes.saturating_mul(count);
                self.set_layout(id, LayoutSize::new(bytes, element.align))
            }
            Recompute::Typedef(target) => {
                let layout = self.type_layout(target)?;
                self.set_layout(id, layout)
            }
            Recompute::Global => self.register_global_range(id),
            Recompute::Function => self.register_function_ranges(id),
        }
    }

    pub(super) fn set_layout(&mut self, id: SymbolId, layout: LayoutSize) -> SymbolResult<()> {
        match &mut self.get_mut(id)?.data {
            SymbolData::Type(ty) => {
                ty.layout = layout;
                Ok(())
            }
            _ => Err(SymbolError::unexpected(format!("{id} carries no layout"))),
        }
    }

    fn positional_mut(&mut self, id: SymbolId) -> SymbolResult<&mut PositionalSymbol> {
        match &mut self.get_mut(id)?.data {
            SymbolData::Field(pos) | SymbolData::BaseClass(pos) => Ok(pos),
            _ => Err(SymbolError::unexpected(format!("{id} is not positional"))),
        }
    }

    /// Live positional children of `owner`, in order.
    fn positional_children(&self, owner: SymbolId) -> SymbolResult<Vec<(SymbolId, PositionalSymbol)>> {
        let symbol = self.get(owner)?;
        let mut members = Vec::with_capacity(symbol.children.len());
        for &child in &symbol.children {
            let child_symbol = self
                .entry(child)
                .ok_or_else(|| SymbolError::unexpected(format!("child {child} of {owner} is missing")))?;
            if let Some(pos) = child_symbol.as_positional() {
                members.push((child, pos.clone()));
            }
        }
        Ok(members)
    }

    fn relayout_udt(&mut self, id: SymbolId, kind: UdtKind) -> SymbolResult<()> {
        let mut slots = Vec::new();
        for (member, pos) in self.positional_children(id)? {
            slots.push(MemberSlot {
                id: member,
                placement: pos.placement,
                layout: self.type_layout(pos.ty)?,
            });
        }
        let result = layout_udt(kind, &slots);
        for (member, offset) in result.offsets {
            let pos = self.positional_mut(member)?;
            pos.actual_offset = offset;
            pos.actual_value = pos.placement.constant();
        }
        self.set_layout(id, result.layout)
    }

    fn relayout_enum(
        &mut self,
        id: SymbolId,
        underlying: SymbolId,
        packing: VariantPacking,
    ) -> SymbolResult<()> {
        let base = self.type_layout(underlying)?;
        let members: Vec<(SymbolId, FieldPlacement)> = self
            .positional_children(id)?
            .into_iter()
            .map(|(member, pos)| (member, pos.placement))
            .collect();
        let result = layout_enum(packing, &members);
        for member in &result.wrapped {
            warn!(enum_id = %id, %member, "enumerant auto-increment wrapped around");
        }
        for (member, value) in result.values {
            let pos = self.positional_mut(member)?;
            pos.actual_offset = None;
            pos.actual_value = value;
        }
        self.set_layout(id, base)
    }

    fn global_extent(&self, id: SymbolId) -> SymbolResult<(Option<Range<u64>>, Option<Range<u64>>)> {
        let global = self
            .get(id)?
            .as_global()
            .ok_or_else(|| SymbolError::unexpected(format!("{id} is not a global")))?;
        let desired = match global.location {
            GlobalLocation::ImageOffset(offset) => {
                let size = self.type_layout(global.ty)?.bytes.max(1);
                Some(offset..offset.saturating_add(size))
            }
            GlobalLocation::Constant(_) => None,
        };
        Ok((global.registered.clone(), desired))
    }

    /// Re-registers a global's range when its offset or size changed since last time.
    pub(super) fn register_global_range(&mut self, id: SymbolId) -> SymbolResult<()> {
        let (previous, desired) = self.global_extent(id)?;
        if previous == desired {
            return Ok(());
        }
        if let Some(previous) = &previous {
            self.ranges.remove(previous, id);
        }
        let registered = match desired {
            Some(range) => match self.ranges.insert(range.clone(), id) {
                Ok(()) => Some(range),
                Err(err) => {
                    warn!(%id, %err, "global range left unregistered");
                    None
                }
            },
            None => None,
        };
        if let SymbolData::Global(global) = &mut self.get_mut(id)?.data {
            global.registered = registered;
        }
        Ok(())
    }

    pub(super) fn register_function_ranges(&mut self, id: SymbolId) -> SymbolResult<()> {
        let (previous, desired) = match &self.get(id)?.data {
            SymbolData::Function(function) => (function.registered.clone(), function.ranges.clone()),
            _ => return Err(SymbolError::unexpected(format!("{id} is not a function"))),
        };
        if previous == desired {
            return Ok(());
        }
        for range in &previous {
            self.ranges.remove(range, id);
        }
        let mut registered = SmallVec::new();
        for range in desired {
            match self.ranges.insert(range.clone(), id) {
                Ok(()) => registered.push(range),
                Err(err) => warn!(%id, %err, "function range left unregistered"),
            }
        }
        if let SymbolData::Function(function) = &mut self.get_mut(id)?.data {
            function.registered = registered;
        }
        Ok(())
    }

    /// Commits a mutation of `id`: cascade from it, then tell the host caches.
    pub(super) fn changed(&mut self, id: SymbolId) {
        if let Err(err) = self.notify_dependent_change(id) {
            warn!(%id, %err, "change notification skipped");
        }
        self.signal_invalidation();
    }
}
