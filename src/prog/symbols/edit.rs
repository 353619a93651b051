//! Mutation and deletion of existing symbols.
//!
//! Like creation, every operation validates first and mutates second; the cascade and
//! invalidation advisory run after the primary change and never fail it.

use std::ops::Range;

use ahash::AHashSet;
use tracing::debug;

use crate::error::{SymbolError, SymbolResult};
use crate::prog::types::{ConstValue, TypeKind, TypeRecord};

use super::builder::OwnerKind;
use super::id::SymbolId;
use super::symbol::{BitField, FieldPlacement, GlobalLocation, LiveRange, SymbolData, SymbolTag};
use super::table::SymbolSet;

impl SymbolSet {
    /// Deletes a symbol and its children.
    ///
    /// Refused with a constraint violation while anything outside the subtree still
    /// references a type inside it; nothing is changed in that case.
    pub fn delete_symbol(&mut self, id: SymbolId) -> SymbolResult<()> {
        let parent = self.get(id)?.parent;
        let subtree = self.subtree_post_order(id)?;
        let members: AHashSet<SymbolId> = subtree.iter().copied().collect();
        for symbol in self.iter() {
            if members.contains(&symbol.id) {
                continue;
            }
            if let Some(used) = symbol
                .data
                .referenced_types()
                .into_iter()
                .find(|ty| members.contains(ty))
            {
                return Err(SymbolError::constraint(format!(
                    "{used} is still referenced by {}",
                    symbol.id
                )));
            }
        }

        for member in &subtree {
            self.remove_edges(*member);
            self.unindex_symbol(*member);
            self.ranges.remove_owner(*member);
            if let Some(importer) = self.importer.as_mut() {
                importer.forget(*member);
            }
        }
        for member in &subtree {
            self.release(*member);
        }
        debug!(%id, removed = subtree.len(), "deleted symbol subtree");

        match parent {
            Some(parent) => {
                let owner = self.get_mut(parent).map_err(|_| {
                    SymbolError::unexpected(format!("owner {parent} of {id} is missing"))
                })?;
                owner.children.retain(|child| *child != id);
                self.changed(parent);
            }
            None => self.signal_invalidation(),
        }
        Ok(())
    }

    /// Children before parents, `id` last.
    fn subtree_post_order(&self, id: SymbolId) -> SymbolResult<Vec<SymbolId>> {
        let mut order = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current);
                continue;
            }
            let symbol = self
                .entry(current)
                .ok_or_else(|| SymbolError::unexpected(format!("child {current} is missing")))?;
            stack.push((current, true));
            stack.extend(symbol.children.iter().rev().map(|child| (*child, false)));
        }
        Ok(order)
    }

    /// Moves a child so it sits before the sibling currently at `position`.
    ///
    /// `position` equal to the child count moves it to the end. Parameters always stay
    /// ahead of locals.
    pub fn move_before(&mut self, id: SymbolId, position: usize) -> SymbolResult<()> {
        let symbol = self.get(id)?;
        let tag = symbol.tag();
        let parent = symbol
            .parent
            .ok_or_else(|| SymbolError::invalid(format!("{id} has no owner to reorder within")))?;
        let siblings = &self.get(parent)?.children;
        let current = siblings
            .iter()
            .position(|child| *child == id)
            .ok_or_else(|| SymbolError::unexpected(format!("{id} missing from owner {parent}")))?;
        if position > siblings.len() {
            return Err(SymbolError::invalid(format!(
                "position {position} is past the {} children of {parent}",
                siblings.len()
            )));
        }
        let target = if position > current { position - 1 } else { position };

        if matches!(tag, SymbolTag::Parameter | SymbolTag::Local) {
            let params = self.parameter_count(parent);
            let legal = match tag {
                SymbolTag::Parameter => target < params,
                _ => target >= params,
            };
            if !legal {
                return Err(SymbolError::constraint(
                    "parameters must stay ahead of locals",
                ));
            }
        }

        let owner = self.get_mut(parent)?;
        owner.children.remove(current);
        owner.children.insert(target, id);
        self.changed(parent);
        Ok(())
    }

    pub fn rename(&mut self, id: SymbolId, name: &str) -> SymbolResult<()> {
        let symbol = self.get(id)?;
        if name.is_empty() && symbol.is_name_indexed() {
            return Err(SymbolError::invalid(format!("{id} needs a non-empty name")));
        }
        match symbol.tag() {
            SymbolTag::Public => {
                if let Some(existing) = self.find_public(name).filter(|existing| *existing != id) {
                    return Err(SymbolError::invalid(format!(
                        "public '{name}' already exists as {existing}"
                    )));
                }
            }
            SymbolTag::Type if symbol.parent.is_none() && !symbol.name.is_empty() => {
                if self.lookup_type(name).is_some_and(|existing| existing != id) {
                    return Err(SymbolError::invalid(format!("type '{name}' already exists")));
                }
            }
            _ => {}
        }
        self.unindex_symbol(id);
        self.get_mut(id)?.name = name.to_owned();
        self.index_symbol(id);
        self.signal_invalidation();
        Ok(())
    }

    pub fn set_qualified_name(&mut self, id: SymbolId, qualified: Option<&str>) -> SymbolResult<()> {
        self.get(id)?;
        self.unindex_symbol(id);
        self.get_mut(id)?.qualified_name = qualified.map(str::to_owned);
        self.index_symbol(id);
        self.signal_invalidation();
        Ok(())
    }

    fn positional_parts(&self, id: SymbolId) -> SymbolResult<(SymbolId, FieldPlacement)> {
        let symbol = self.get(id)?;
        let pos = symbol
            .as_positional()
            .ok_or_else(|| SymbolError::invalid(format!("{id} is not a field or base class")))?;
        let owner = symbol
            .parent
            .ok_or_else(|| SymbolError::unexpected(format!("positional {id} has no owner")))?;
        Ok((owner, pos.placement))
    }

    fn store_placement(&mut self, id: SymbolId, placement: FieldPlacement) -> SymbolResult<()> {
        match &mut self.get_mut(id)?.data {
            SymbolData::Field(pos) | SymbolData::BaseClass(pos) => {
                pos.placement = placement;
                if !matches!(placement, FieldPlacement::Offset(_)) {
                    pos.bit_field = None;
                }
            }
            _ => return Err(SymbolError::unexpected(format!("{id} lost its placement"))),
        }
        self.changed(id);
        Ok(())
    }

    /// Changes an explicit offset. Automatic and value-based fields refuse.
    pub fn set_field_offset(&mut self, id: SymbolId, offset: u64) -> SymbolResult<()> {
        match self.positional_parts(id)?.1 {
            FieldPlacement::Offset(_) => self.store_placement(id, FieldPlacement::Offset(offset)),
            FieldPlacement::AutomaticAppend => Err(SymbolError::constraint(format!(
                "{id} uses automatic layout; change its placement instead"
            ))),
            FieldPlacement::Constant(_) | FieldPlacement::AutomaticIncrement => Err(
                SymbolError::constraint(format!("{id} is value based and has no offset")),
            ),
        }
    }

    /// Changes a constant value. Only constant-placed fields accept it.
    pub fn set_field_value(&mut self, id: SymbolId, value: ConstValue) -> SymbolResult<()> {
        let (owner, placement) = self.positional_parts(id)?;
        if !matches!(placement, FieldPlacement::Constant(_)) {
            return Err(SymbolError::constraint(format!("{id} does not hold a constant value")));
        }
        let placement = self.check_placement(self.owner_kind(owner)?, FieldPlacement::Constant(value))?;
        self.store_placement(id, placement)
    }

    pub fn set_field_placement(&mut self, id: SymbolId, placement: FieldPlacement) -> SymbolResult<()> {
        let (owner, _) = self.positional_parts(id)?;
        if self.get(id)?.tag() == SymbolTag::BaseClass && placement.is_value_based() {
            return Err(SymbolError::invalid("base classes must be offset based"));
        }
        let placement = self.check_placement(self.owner_kind(owner)?, placement)?;
        self.store_placement(id, placement)
    }

    /// Retypes a UDT field. Enumerants cannot be retyped.
    pub fn set_field_type(&mut self, id: SymbolId, ty: SymbolId) -> SymbolResult<()> {
        let (owner, _) = self.positional_parts(id)?;
        if matches!(self.owner_kind(owner)?, OwnerKind::Enum { .. }) {
            return Err(SymbolError::constraint(format!("enumerant {id} cannot be retyped")));
        }
        if self.get(id)?.tag() == SymbolTag::BaseClass
            && !matches!(
                self.expect_type(ty, "base class")?.record,
                TypeRecord::Udt(_)
            )
        {
            return Err(SymbolError::invalid(format!("base class type {ty} is not a UDT")));
        }
        self.check_member_type(owner, ty, "field type")?;
        self.retarget(id, |data| match data {
            SymbolData::Field(pos) | SymbolData::BaseClass(pos) => pos.ty = ty,
            _ => {}
        })
    }

    /// Attaches or clears bit-field metadata on an explicit-offset field.
    pub fn set_bit_field(&mut self, id: SymbolId, bits: Option<BitField>) -> SymbolResult<()> {
        let (_, placement) = self.positional_parts(id)?;
        if bits.is_some() && !matches!(placement, FieldPlacement::Offset(_)) {
            return Err(SymbolError::constraint(format!(
                "bit-fields need an explicit offset; {id} has none"
            )));
        }
        if let Some(bits) = bits
            && bits.length == 0
        {
            return Err(SymbolError::invalid("bit-field length must be non-zero"));
        }
        if let SymbolData::Field(pos) | SymbolData::BaseClass(pos) = &mut self.get_mut(id)?.data {
            pos.bit_field = bits;
        }
        self.signal_invalidation();
        Ok(())
    }

    /// Swaps the type edges of `id` around an in-place update of its payload.
    fn retarget(&mut self, id: SymbolId, update: impl FnOnce(&mut SymbolData)) -> SymbolResult<()> {
        self.remove_edges(id);
        update(&mut self.get_mut(id)?.data);
        self.install_edges(id)?;
        self.changed(id);
        Ok(())
    }

    fn global_parts(&self, id: SymbolId) -> SymbolResult<(SymbolId, GlobalLocation)> {
        self.get(id)?
            .as_global()
            .map(|global| (global.ty, global.location))
            .ok_or_else(|| SymbolError::invalid(format!("{id} is not a global")))
    }

    fn check_global_range(&self, id: SymbolId, ty: SymbolId, location: GlobalLocation) -> SymbolResult<()> {
        let layout = self.expect_type(ty, "global type")?.layout;
        if let GlobalLocation::ImageOffset(offset) = location {
            let range = offset..offset.saturating_add(layout.bytes.max(1));
            if let Some(existing) = self.ranges.overlapping(&range)
                && existing.id != id
            {
                return Err(SymbolError::invalid(format!(
                    "global {id} at 0x{offset:X} would overlap {}",
                    existing.id
                )));
            }
        }
        Ok(())
    }

    pub fn set_global_location(&mut self, id: SymbolId, location: GlobalLocation) -> SymbolResult<()> {
        let (ty, _) = self.global_parts(id)?;
        self.check_global_range(id, ty, location)?;
        if let SymbolData::Global(global) = &mut self.get_mut(id)?.data {
            global.location = location;
        }
        self.changed(id);
        Ok(())
    }

    pub fn set_global_type(&mut self, id: SymbolId, ty: SymbolId) -> SymbolResult<()> {
        let (_, location) = self.global_parts(id)?;
        self.check_global_range(id, ty, location)?;
        self.retarget(id, |data| {
            if let SymbolData::Global(global) = data {
                global.ty = ty;
            }
        })
    }

    pub fn set_function_ranges(&mut self, id: SymbolId, ranges: &[Range<u64>]) -> SymbolResult<()> {
        if self.get(id)?.as_function().is_none() {
            return Err(SymbolError::invalid(format!("{id} is not a function")));
        }
        self.check_code_ranges(ranges, Some(id))?;
        if let SymbolData::Function(function) = &mut self.get_mut(id)?.data {
            function.ranges = ranges.iter().cloned().collect();
        }
        self.changed(id);
        Ok(())
    }

    pub fn set_function_return_type(&mut self, id: SymbolId, ty: SymbolId) -> SymbolResult<()> {
        if self.get(id)?.as_function().is_none() {
            return Err(SymbolError::invalid(format!("{id} is not a function")));
        }
        self.expect_type(ty, "return type")?;
        self.retarget(id, |data| {
            if let SymbolData::Function(function) = data {
                function.return_type = ty;
            }
        })
    }

    /// Replaces the return and parameter types of a function type.
    pub fn set_function_signature(
        &mut self,
        id: SymbolId,
        return_type: Option<SymbolId>,
        params: &[SymbolId],
    ) -> SymbolResult<()> {
        if self.expect_type(id, "function type")?.kind() != TypeKind::Function {
            return Err(SymbolError::invalid(format!("{id} is not a function type")));
        }
        if let Some(ret) = return_type {
            self.expect_type(ret, "return type")?;
        }
        for param in params {
            self.expect_type(*param, "parameter type")?;
        }
        self.retarget(id, |data| {
            if let SymbolData::Type(ty) = data
                && let TypeRecord::Function(function) = &mut ty.record
            {
                function.return_type = return_type;
                function.params = params.to_vec();
            }
        })
    }

    pub fn set_variable_type(&mut self, id: SymbolId, ty: SymbolId) -> SymbolResult<()> {
        if self.get(id)?.as_variable().is_none() {
            return Err(SymbolError::invalid(format!("{id} is not a parameter or local")));
        }
        self.expect_type(ty, "variable type")?;
        self.retarget(id, |data| {
            if let SymbolData::Parameter(var) | SymbolData::Local(var) = data {
                var.ty = ty;
            }
        })
    }

    /// Adds a live range, relative to the owning function's entry, to a parameter or local.
    pub fn add_live_range(&mut self, id: SymbolId, range: LiveRange) -> SymbolResult<()> {
        let symbol = self.get(id)?;
        let var = symbol
            .as_variable()
            .ok_or_else(|| SymbolError::invalid(format!("{id} is not a parameter or local")))?;
        if range.size == 0 {
            return Err(SymbolError::invalid("live ranges must be non-empty"));
        }
        if let Some(existing) = var.live_ranges.iter().find(|other| other.overlaps(&range)) {
            return Err(SymbolError::invalid(format!(
                "live range at +0x{:X} overlaps the one at +0x{:X}",
                range.offset, existing.offset
            )));
        }
        let function = symbol
            .parent
            .and_then(|parent| self.entry(parent))
            .and_then(|parent| parent.as_function())
            .ok_or_else(|| SymbolError::unexpected(format!("variable {id} has no owning function")))?;
        let span = match (function.ranges.first(), function.ranges.iter().map(|r| r.end).max()) {
            (Some(first), Some(end)) => end - first.start,
            _ => 0,
        };
        if range.end() > span {
            return Err(SymbolError::invalid(format!(
                "live range +0x{:X}..+0x{:X} runs past the function's code",
                range.offset,
                range.end()
            )));
        }

        if let SymbolData::Parameter(var) | SymbolData::Local(var) = &mut self.get_mut(id)?.data {
            let at = var
                .live_ranges
                .partition_point(|existing| existing.offset < range.offset);
            var.live_ranges.insert(at, range);
        }
        self.signal_invalidation();
        Ok(())
    }

    pub fn remove_live_range(&mut self, id: SymbolId, index: usize) -> SymbolResult<LiveRange> {
        let symbol = self.get_mut(id)?;
        let var = match &mut symbol.data {
            SymbolData::Parameter(var) | SymbolData::Local(var) => var,
            _ => return Err(SymbolError::invalid(format!("{id} is not a parameter or local"))),
        };
        if index >= var.live_ranges.len() {
            return Err(SymbolError::not_found(format!("live range {index} of {id}")));
        }
        let removed = var.live_ranges.remove(index);
        self.signal_invalidation();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prog::symbols::{LocationDesc, ModuleInfo};
    use crate::prog::types::{BasicEncoding, LayoutSize, PointerKind, UdtKind};

    fn set_with_int() -> (SymbolSet, SymbolId) {
        let mut set = SymbolSet::new(ModuleInfo::new("app", 0, 0));
        let int = set.create_basic_type("int", BasicEncoding::Signed, 4).expect("int");
        (set, int)
    }

    fn actual_offset(set: &SymbolSet, id: SymbolId) -> Option<u64> {
        set.get(id).expect("field").as_positional().expect("pos").actual_offset
    }

    #[test]
    fn add_then_delete_restores_layout() {
        let (mut set, int) = set_with_int();
        let byte = set.create_basic_type("char", BasicEncoding::Char, 1).expect("char");
        let foo = set.udt_builder("Foo", UdtKind::Struct).field("a", byte).finish().expect("udt");
        let before = set.type_layout(foo).expect("layout");
        let extra = set.create_field(foo, FieldPlacement::AutomaticAppend, int, "b").expect("field");
        assert_eq!(set.type_layout(foo).expect("layout"), LayoutSize::new(8, 4));
        set.delete_symbol(extra).expect("delete");
        assert_eq!(set.type_layout(foo).expect("layout"), before, "size and alignment restored");
        assert!(!set.contains(extra));
    }

    #[test]
    fn deleting_a_referenced_type_is_refused() {
        let (mut set, int) = set_with_int();
        let foo = set.udt_builder("Foo", UdtKind::Struct).field("a", int).finish().expect("udt");
        let before = set.len();
        let err = set.delete_symbol(int).unwrap_err();
        assert!(matches!(err, SymbolError::ConstraintViolation(_)));
        assert_eq!(set.len(), before, "nothing removed");
        set.delete_symbol(foo).expect("self-contained subtree");
        set.delete_symbol(int).expect("no users left");
        assert!(set.lookup_type("int").is_none(), "name index updated on delete");
    }

    #[test]
    fn self_referential_subtree_deletes_once_pointer_is_gone() {
        let (mut set, _) = set_with_int();
        let node = set.create_udt("Node", UdtKind::Struct).expect("udt");
        let pointer = set.create_pointer(node, PointerKind::Standard).expect("pointer");
        let next = set.create_field(node, FieldPlacement::AutomaticAppend, pointer, "next").expect("field");
        assert!(set.delete_symbol(pointer).is_err(), "field still uses the pointer");
        set.delete_symbol(next).expect("field");
        set.delete_symbol(pointer).expect("pointer");
        set.delete_symbol(node).expect("node");
    }

    #[test]
    fn move_before_front_reorders_offsets() {
        let (mut set, int) = set_with_int();
        let byte = set.create_basic_type("char", BasicEncoding::Char, 1).expect("char");
        let foo = set
            .udt_builder("Foo", UdtKind::Struct)
            .field("a", int)
            .field("b", int)
            .field("c", byte)
            .finish()
            .expect("udt");
        let children = set.get(foo).expect("foo").children().to_vec();
        set.move_before(children[2], 0).expect("move");
        assert_eq!(set.get(foo).expect("foo").children()[0], children[2]);
        assert_eq!(actual_offset(&set, children[2]), Some(0));
        assert_eq!(actual_offset(&set, children[0]), Some(4));
        assert_eq!(actual_offset(&set, children[1]), Some(8));
        assert_eq!(set.type_layout(foo).expect("layout"), LayoutSize::new(12, 4));
    }

    #[test]
    fn offsets_only_change_on_explicit_fields() {
        let (mut set, int) = set_with_int();
        let foo = set
            .udt_builder("Foo", UdtKind::Struct)
            .field("auto", int)
            .field_at("fixed", int, 8)
            .finish()
            .expect("udt");
        let children = set.get(foo).expect("foo").children().to_vec();
        let err = set.set_field_offset(children[0], 4).unwrap_err();
        assert!(matches!(err, SymbolError::ConstraintViolation(_)));
        set.set_field_offset(children[1], 16).expect("explicit");
        assert_eq!(actual_offset(&set, children[1]), Some(16));
        assert_eq!(set.type_layout(foo).expect("layout").bytes, 20);
        set.set_field_placement(children[0], FieldPlacement::Offset(4)).expect("placement");
        set.set_field_offset(children[0], 0).expect("now explicit");
    }

    #[test]
    fn enumerants_refuse_retyping_and_offsets() {
        let (mut set, int) = set_with_int();
        let color = set.enum_builder("Color", Some(int)).member("Red").finish().expect("enum");
        let red = set.get(color).expect("enum").children()[0];
        assert!(matches!(
            set.set_field_type(red, int),
            Err(SymbolError::ConstraintViolation(_))
        ));
        assert!(matches!(
            set.set_field_offset(red, 0),
            Err(SymbolError::ConstraintViolation(_))
        ));
        assert!(matches!(
            set.set_field_value(red, ConstValue::I4(4)),
            Err(SymbolError::ConstraintViolation(_))
        ));
        set.set_field_placement(red, FieldPlacement::Constant(ConstValue::I4(4))).expect("placement");
        set.set_field_value(red, ConstValue::I4(5)).expect("value");
        let value = set.get(red).expect("red").as_positional().expect("pos").actual_value;
        assert_eq!(value, Some(ConstValue::I4(5)));
    }

    #[test]
    fn retyping_a_field_updates_edges_and_layout() {
        let (mut set, int) = set_with_int();
        let long = set.create_basic_type("long long", BasicEncoding::Signed, 8).expect("i64");
        let foo = set.udt_builder("Foo", UdtKind::Struct).field("a", int).finish().expect("udt");
        let a = set.get(foo).expect("foo").children()[0];
        set.set_field_type(a, long).expect("retype");
        assert!(!set.get(int).expect("int").dependents().contains(&a), "old edge removed");
        assert!(set.get(long).expect("long").dependents().contains(&a));
        assert_eq!(set.type_layout(foo).expect("layout"), LayoutSize::new(8, 8));
    }

    #[test]
    fn array_size_tracks_element_growth() {
        let (mut set, int) = set_with_int();
        let foo = set.udt_builder("Foo", UdtKind::Struct).field("a", int).finish().expect("udt");
        let array = set.create_array(foo, 5).expect("array");
        assert_eq!(set.type_layout(array).expect("layout").bytes, 20);
        set.create_field(foo, FieldPlacement::AutomaticAppend, int, "b").expect("grow");
        assert_eq!(set.type_layout(array).expect("layout").bytes, 40, "five eight-byte elements");
    }

    #[test]
    fn globals_reregister_when_their_type_grows() {
        let (mut set, int) = set_with_int();
        let foo = set.udt_builder("Foo", UdtKind::Struct).field("a", int).finish().expect("udt");
        let global = set.create_global("g", GlobalLocation::ImageOffset(0x100), foo).expect("global");
        assert!(set.symbol_at_offset(0x104).is_none());
        set.create_field(foo, FieldPlacement::AutomaticAppend, int, "b").expect("grow");
        assert_eq!(set.symbol_at_offset(0x104).map(|entry| entry.id), Some(global));
        set.set_global_location(global, GlobalLocation::Constant(ConstValue::I4(1))).expect("constant");
        assert!(set.symbol_at_offset(0x100).is_none(), "constants have no range");
    }

    #[test]
    fn parameters_cannot_move_behind_locals() {
        let (mut set, int) = set_with_int();
        let function = set.create_function("f", int, &[0..0x40]).expect("fn");
        let p0 = set.create_parameter(function, int, "p0").expect("p0");
        let p1 = set.create_parameter(function, int, "p1").expect("p1");
        let local = set.create_local(function, int, "l").expect("local");
        assert!(matches!(
            set.move_before(p0, 3),
            Err(SymbolError::ConstraintViolation(_))
        ));
        assert!(matches!(
            set.move_before(local, 0),
            Err(SymbolError::ConstraintViolation(_))
        ));
        set.move_before(p1, 0).expect("reorder parameters");
        assert_eq!(set.get(function).expect("fn").children(), &[p1, p0, local]);
    }

    #[test]
    fn live_ranges_must_be_disjoint_and_inside_the_function() {
        let (mut set, int) = set_with_int();
        let function = set.create_function("f", int, &[0x100..0x140]).expect("fn");
        let local = set.create_local(function, int, "x").expect("local");
        set.add_live_range(local, LiveRange::new(0x10, 0x8, LocationDesc::Register(3))).expect("range");
        set.add_live_range(local, LiveRange::new(0x0, 0x8, LocationDesc::RegisterRelative { register: 7, offset: -8 }))
            .expect("range");
        assert!(set.add_live_range(local, LiveRange::new(0x14, 0x4, LocationDesc::Register(1))).is_err());
        assert!(set.add_live_range(local, LiveRange::new(0x3C, 0x8, LocationDesc::Register(1))).is_err());
        let ranges = &set.get(local).expect("local").as_variable().expect("var").live_ranges;
        assert_eq!(ranges[0].offset, 0, "kept sorted by offset");
        let removed = set.remove_live_range(local, 1).expect("remove");
        assert_eq!(removed.offset, 0x10);
    }

    #[test]
    fn renaming_updates_the_name_index() {
        let (mut set, _) = set_with_int();
        let foo = set.create_udt("Foo", UdtKind::Struct).expect("udt");
        set.rename(foo, "Bar").expect("rename");
        assert!(set.lookup_type("Foo").is_none());
        assert_eq!(set.lookup_type("Bar"), Some(foo));
        set.set_qualified_name(foo, Some("ns::Bar")).expect("qualified");
        assert_eq!(set.symbol_ids_by_name("ns::Bar"), &[foo]);
        assert!(set.rename(foo, "int").is_err(), "names stay unique among types");
    }
}
