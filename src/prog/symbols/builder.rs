//! Factory operations and fluent builders. Every entity enters the graph through here.
//!
//! Each operation validates owners and referenced types before it touches any state, so a
//! returned error leaves the graph exactly as it was.

use std::ops::Range;

use ahash::AHashSet;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::error::{SymbolError, SymbolResult};
use crate::prog::types::{
    ArrayType, BasicEncoding, BasicType, ConstValue, EnumType, FunctionType, LayoutSize,
    PointerKind, PointerType, TypeKind, TypeRecord, TypeSymbol, TypedefType, UdtKind, UdtType,
    VariantPacking,
};

use super::id::SymbolId;
use super::symbol::{
    BitField, FieldPlacement, FunctionSymbol, GlobalLocation, GlobalSymbol, PositionalSymbol,
    PublicSymbol, SymbolData, SymbolTag, VariableSymbol,
};
use super::table::{DerivedKey, SymbolSet};

/// What a prospective child's owner is able to hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum OwnerKind {
    Udt(UdtKind),
    Enum {
        underlying: SymbolId,
        packing: VariantPacking,
    },
    Function,
}

impl SymbolSet {
    pub(super) fn owner_kind(&self, owner: SymbolId) -> SymbolResult<OwnerKind> {
        let symbol = self
            .entry(owner)
            .ok_or_else(|| SymbolError::invalid(format!("owner {owner} does not exist")))?;
        match &symbol.data {
            SymbolData::Type(ty) => match &ty.record {
                TypeRecord::Udt(udt) => Ok(OwnerKind::Udt(udt.kind)),
                TypeRecord::Enum(enum_ty) => Ok(OwnerKind::Enum {
                    underlying: enum_ty.underlying,
                    packing: enum_ty.packing,
                }),
                other => Err(SymbolError::invalid(format!(
                    "owner {owner} is a {:?} type and holds no members",
                    other.kind()
                ))),
            },
            SymbolData::Function(_) => Ok(OwnerKind::Function),
            _ => Err(SymbolError::invalid(format!("owner {owner} cannot hold children"))),
        }
    }

    /// Normalizes a declared placement for the owner, converting enum constants to the
    /// enum's packing.
    pub(super) fn check_placement(
        &self,
        owner: OwnerKind,
        placement: FieldPlacement,
    ) -> SymbolResult<FieldPlacement> {
        match owner {
            OwnerKind::Udt(_) => match placement {
                FieldPlacement::AutomaticIncrement => Err(SymbolError::invalid(
                    "automatic increment is only legal on enum members",
                )),
                other => Ok(other),
            },
            OwnerKind::Enum { packing, .. } => match placement {
                FieldPlacement::Constant(value) => value
                    .convert(packing)
                    .map(FieldPlacement::Constant)
                    .ok_or_else(|| {
                        SymbolError::invalid(format!(
                            "{value} does not fit the enum's {packing:?} storage"
                        ))
                    }),
                FieldPlacement::AutomaticIncrement => Ok(placement),
                FieldPlacement::Offset(_) | FieldPlacement::AutomaticAppend => Err(
                    SymbolError::invalid("enum members must be constant or automatically increasing"),
                ),
            },
            OwnerKind::Function => Err(SymbolError::invalid(
                "functions hold parameters and locals, not positional members",
            )),
        }
    }

    /// Whether an instance of `ty` embeds `target` by value.
    pub(super) fn type_contains(&self, ty: SymbolId, target: SymbolId) -> bool {
        let mut stack = vec![ty];
        let mut seen = AHashSet::new();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            let Some(symbol) = self.entry(current) else {
                continue;
            };
            let Some(type_symbol) = symbol.as_type() else {
                continue;
            };
            match &type_symbol.record {
                TypeRecord::Array(array) => stack.push(array.element),
                TypeRecord::Typedef(typedef) => stack.push(typedef.target),
                TypeRecord::Udt(_) => stack.extend(
                    symbol
                        .children
                        .iter()
                        .filter_map(|child| self.entry(*child))
                        .filter_map(|child| child.as_positional())
                        .map(|pos| pos.ty),
                ),
                TypeRecord::Basic(_)
                | TypeRecord::Pointer(_)
                | TypeRecord::Enum(_)
                | TypeRecord::Function(_) => {}
            }
        }
        false
    }

    /// Validates a type used by value inside `owner`.
    pub(super) fn check_member_type(&self, owner: SymbolId, ty: SymbolId, role: &str) -> SymbolResult<()> {
        let type_symbol = self.expect_type(ty, role)?;
        if type_symbol.kind() == TypeKind::Function {
            return Err(SymbolError::invalid(format!(
                "{role} {ty} is a function type and has no storage"
            )));
        }
        if self.type_contains(ty, owner) {
            return Err(SymbolError::invalid(format!(
                "{role} {ty} would contain {owner} by value"
            )));
        }
        Ok(())
    }

    fn check_new_type_name(&self, name: &str) -> SymbolResult<()> {
        if name.is_empty() {
            return Err(SymbolError::invalid("type name must not be empty"));
        }
        if self.lookup_type(name).is_some() {
            return Err(SymbolError::invalid(format!("type '{name}' already exists")));
        }
        Ok(())
    }

    /// Aggregates may be anonymous; anonymous ones stay out of the name index.
    fn check_aggregate_name(&self, name: &str) -> SymbolResult<()> {
        if name.is_empty() {
            return Ok(());
        }
        self.check_new_type_name(name)
    }

    pub(super) fn check_code_ranges(
        &self,
        ranges: &[Range<u64>],
        owner: Option<SymbolId>,
    ) -> SymbolResult<()> {
        if ranges.is_empty() {
            return Err(SymbolError::invalid("a function needs at least one code range"));
        }
        for (index, range) in ranges.iter().enumerate() {
            if range.start >= range.end {
                return Err(SymbolError::invalid(format!(
                    "code range 0x{:X}..0x{:X} is empty",
                    range.start, range.end
                )));
            }
            if ranges[..index]
                .iter()
                .any(|other| other.start < range.end && range.start < other.end)
            {
                return Err(SymbolError::invalid(format!(
                    "code range 0x{:X}..0x{:X} overlaps another range of the same function",
                    range.start, range.end
                )));
            }
            if let Some(existing) = self.ranges.overlapping(range)
                && Some(existing.id) != owner
            {
                return Err(SymbolError::invalid(format!(
                    "code range 0x{:X}..0x{:X} overlaps {}",
                    range.start, range.end, existing.id
                )));
            }
        }
        Ok(())
    }

    /// Stores, links, and lays out a validated symbol.
    pub(super) fn commit(
        &mut self,
        name: String,
        data: SymbolData,
        owner: Option<(SymbolId, Option<usize>)>,
    ) -> SymbolResult<SymbolId> {
        let id = self.allocate(name, data, owner)?;
        self.install_edges(id)?;
        self.changed(id);
        Ok(id)
    }

    fn commit_type(&mut self, name: &str, record: TypeRecord, layout: LayoutSize) -> SymbolResult<SymbolId> {
        let data = SymbolData::Type(TypeSymbol::new(record, layout));
        self.commit(name.to_owned(), data, None)
    }

    pub fn create_basic_type(
        &mut self,
        name: &str,
        encoding: BasicEncoding,
        byte_size: u64,
    ) -> SymbolResult<SymbolId> {
        self.check_new_type_name(name)?;
        let basic = BasicType::new(encoding, byte_size);
        let layout = LayoutSize::new(byte_size, basic.alignment());
        self.commit_type(name, TypeRecord::Basic(basic), layout)
    }

    pub fn create_udt(&mut self, name: &str, kind: UdtKind) -> SymbolResult<SymbolId> {
        self.check_aggregate_name(name)?;
        self.commit_type(name, TypeRecord::Udt(UdtType::new(kind)), LayoutSize::UNSET)
    }

    /// Returns the existing pointer of the same flavor when there is one.
    pub fn create_pointer(&mut self, pointee: SymbolId, kind: PointerKind) -> SymbolResult<SymbolId> {
        self.expect_type(pointee, "pointee")?;
        if let Some(existing) = self.lookup_derived(DerivedKey::Pointer(pointee, kind)) {
            return Ok(existing);
        }
        let size = self.config.pointer_size;
        let record = TypeRecord::Pointer(PointerType::new(pointee, kind));
        self.commit_type("", record, LayoutSize::new(size, size))
    }

    /// Returns the existing array of the same element and count when there is one.
    pub fn create_array(&mut self, element: SymbolId, count: u64) -> SymbolResult<SymbolId> {
        if self.expect_type(element, "array element")?.kind() == TypeKind::Function {
            return Err(SymbolError::invalid(format!(
                "array element {element} is a function type"
            )));
        }
        if let Some(existing) = self.lookup_derived(DerivedKey::Array(element, count)) {
            return Ok(existing);
        }
        let record = TypeRecord::Array(ArrayType::new(element, count));
        self.commit_type("", record, LayoutSize::UNSET)
    }

    pub fn create_typedef(&mut self, name: &str, target: SymbolId) -> SymbolResult<SymbolId> {
        self.check_new_type_name(name)?;
        self.expect_type(target, "typedef target")?;
        let record = TypeRecord::Typedef(TypedefType { target });
        self.commit_type(name, record, LayoutSize::UNSET)
    }

    /// Creates an enum over `underlying`, or over `int` when none is given.
    pub fn create_enum(&mut self, name: &str, underlying: Option<SymbolId>) -> SymbolResult<SymbolId> {
        self.check_aggregate_name(name)?;
        let underlying = match underlying {
            Some(id) => id,
            None => self.find_type_by_name("int", true)?,
        };
        let record = {
            let base = self
                .expect_type(underlying, "enum underlying type")?
                .record
                .as_basic()
                .ok_or_else(|| {
                    SymbolError::invalid(format!("enum underlying type {underlying} is not intrinsic"))
                })?;
            EnumType::new(underlying, base).ok_or_else(|| {
                SymbolError::invalid(format!("enum underlying type {underlying} is not integral"))
            })?
        };
        self.commit_type(name, TypeRecord::Enum(record), LayoutSize::UNSET)
    }

    pub fn create_function_type(
        &mut self,
        return_type: Option<SymbolId>,
        params: &[SymbolId],
    ) -> SymbolResult<SymbolId> {
        if let Some(ret) = return_type {
            self.expect_type(ret, "return type")?;
        }
        for param in params {
            self.expect_type(*param, "parameter type")?;
        }
        let record = TypeRecord::Function(FunctionType::new(return_type, params.to_vec()));
        self.commit_type("", record, LayoutSize::UNSET)
    }

    /// Adds a field to a UDT or a member to an enum.
    ///
    /// Enum members take the enum's underlying type; passing the enum itself is accepted.
    pub fn create_field(
        &mut self,
        owner: SymbolId,
        placement: FieldPlacement,
        ty: SymbolId,
        name: &str,
    ) -> SymbolResult<SymbolId> {
        let kind = self.owner_kind(owner)?;
        let ty = match kind {
            OwnerKind::Udt(_) => {
                self.check_member_type(owner, ty, "field type")?;
                ty
            }
            OwnerKind::Enum { underlying, .. } => {
                if ty != underlying && ty != owner {
                    return Err(SymbolError::invalid(format!(
                        "enum member type {ty} must be the enum or its underlying type"
                    )));
                }
                underlying
            }
            OwnerKind::Function => {
                return Err(SymbolError::invalid(format!(
                    "owner {owner} is a function; use parameters or locals"
                )));
            }
        };
        let placement = self.check_placement(kind, placement)?;
        let data = SymbolData::Field(PositionalSymbol::new(ty, placement));
        self.commit(name.to_owned(), data, Some((owner, None)))
    }

    /// Adds an enumerant; `None` continues from the previous member.
    pub fn create_enumerant(
        &mut self,
        owner: SymbolId,
        name: &str,
        value: Option<ConstValue>,
    ) -> SymbolResult<SymbolId> {
        let placement = value.map_or(FieldPlacement::AutomaticIncrement, FieldPlacement::Constant);
        self.create_field(owner, placement, owner, name)
    }

    pub fn create_base_class(
        &mut self,
        owner: SymbolId,
        placement: FieldPlacement,
        ty: SymbolId,
    ) -> SymbolResult<SymbolId> {
        let kind = self.owner_kind(owner)?;
        if !matches!(kind, OwnerKind::Udt(_)) {
            return Err(SymbolError::invalid(format!("owner {owner} is not a UDT")));
        }
        if placement.is_value_based() {
            return Err(SymbolError::invalid("base classes must be offset based"));
        }
        let base = self.get(ty).ok().and_then(|symbol| symbol.as_type());
        if !matches!(base.map(|ty| &ty.record), Some(TypeRecord::Udt(_))) {
            return Err(SymbolError::invalid(format!("base class type {ty} is not a UDT")));
        }
        self.check_member_type(owner, ty, "base class")?;
        let name = self.get(ty)?.name.clone();
        let data = SymbolData::BaseClass(PositionalSymbol::new(ty, placement));
        self.commit(name, data, Some((owner, None)))
    }

    pub fn create_global(
        &mut self,
        name: &str,
        location: GlobalLocation,
        ty: SymbolId,
    ) -> SymbolResult<SymbolId> {
        if name.is_empty() {
            return Err(SymbolError::invalid("global name must not be empty"));
        }
        let layout = self.expect_type(ty, "global type")?.layout;
        if let GlobalLocation::ImageOffset(offset) = location {
            let range = offset..offset.saturating_add(layout.bytes.max(1));
            if let Some(existing) = self.ranges.overlapping(&range) {
                return Err(SymbolError::invalid(format!(
                    "global '{name}' at 0x{offset:X} overlaps {}",
                    existing.id
                )));
            }
        }
        let data = SymbolData::Global(GlobalSymbol {
            ty,
            location,
            registered: None,
        });
        self.commit(name.to_owned(), data, None)
    }

    pub fn create_function(
        &mut self,
        name: &str,
        return_type: SymbolId,
        ranges: &[Range<u64>],
    ) -> SymbolResult<SymbolId> {
        if name.is_empty() {
            return Err(SymbolError::invalid("function name must not be empty"));
        }
        self.expect_type(return_type, "return type")?;
        self.check_code_ranges(ranges, None)?;
        let data = SymbolData::Function(FunctionSymbol {
            return_type,
            ranges: ranges.iter().cloned().collect(),
            registered: SmallVec::new(),
        });
        self.commit(name.to_owned(), data, None)
    }

    /// Number of leading parameter children of a function.
    pub(super) fn parameter_count(&self, function: SymbolId) -> usize {
        self.entry(function)
            .map(|symbol| {
                symbol
                    .children
                    .iter()
                    .filter(|child| {
                        self.entry(**child)
                            .is_some_and(|child| child.tag() == SymbolTag::Parameter)
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    fn check_variable(&self, function: SymbolId, ty: SymbolId) -> SymbolResult<()> {
        if self.owner_kind(function)? != OwnerKind::Function {
            return Err(SymbolError::invalid(format!("owner {function} is not a function")));
        }
        self.expect_type(ty, "variable type")?;
        Ok(())
    }

    /// Adds a parameter after the existing parameters and before any locals.
    pub fn create_parameter(&mut self, function: SymbolId, ty: SymbolId, name: &str) -> SymbolResult<SymbolId> {
        self.check_variable(function, ty)?;
        let position = self.parameter_count(function);
        let data = SymbolData::Parameter(VariableSymbol {
            ty,
            live_ranges: Vec::new(),
        });
        self.commit(name.to_owned(), data, Some((function, Some(position))))
    }

    pub fn create_local(&mut self, function: SymbolId, ty: SymbolId, name: &str) -> SymbolResult<SymbolId> {
        self.check_variable(function, ty)?;
        let data = SymbolData::Local(VariableSymbol {
            ty,
            live_ranges: Vec::new(),
        });
        self.commit(name.to_owned(), data, Some((function, None)))
    }

    pub fn create_public(&mut self, name: &str, offset: u64) -> SymbolResult<SymbolId> {
        if name.is_empty() {
            return Err(SymbolError::invalid("public name must not be empty"));
        }
        if let Some(existing) = self.find_public(name) {
            return Err(SymbolError::invalid(format!(
                "public '{name}' already exists as {existing}"
            )));
        }
        let data = SymbolData::Public(PublicSymbol { offset });
        self.commit(name.to_owned(), data, None)
    }

    /// Code extent starting at `offset` as reported by the importer's unwind metadata.
    fn function_extent(&mut self, offset: u64) -> SymbolResult<Range<u64>> {
        let extent = self
            .with_importer(|importer, _| importer.function_extent(offset))
            .transpose()?
            .flatten();
        match extent {
            Some(range) if range.contains(&offset) => Ok(offset..range.end),
            _ => Err(SymbolError::not_found(format!(
                "no code extent known for offset 0x{offset:X}"
            ))),
        }
    }

    /// Turns a public into a function in place, keeping its id and name.
    ///
    /// Without `code_size` the extent comes from the importer's unwind metadata.
    pub fn promote_public(
        &mut self,
        public: SymbolId,
        return_type: SymbolId,
        params: &[(&str, SymbolId)],
        code_size: Option<u64>,
    ) -> SymbolResult<SymbolId> {
        let offset = match &self.get(public)?.data {
            SymbolData::Public(public) => public.offset,
            _ => return Err(SymbolError::invalid(format!("{public} is not a public symbol"))),
        };
        self.expect_type(return_type, "return type")?;
        for (_, ty) in params {
            self.expect_type(*ty, "parameter type")?;
        }
        let range = match code_size {
            Some(size) => offset..offset.saturating_add(size),
            None => self.function_extent(offset)?,
        };
        self.check_code_ranges(std::slice::from_ref(&range), None)?;

        self.unindex_symbol(public);
        self.get_mut(public)?.data = SymbolData::Function(FunctionSymbol {
            return_type,
            ranges: SmallVec::from_elem(range, 1),
            registered: SmallVec::new(),
        });
        self.index_symbol(public);
        debug!(id = %public, offset, "promoted public to function");
        for (name, ty) in params {
            let data = SymbolData::Parameter(VariableSymbol {
                ty: *ty,
                live_ranges: Vec::new(),
            });
            let position = self.parameter_count(public);
            let id = self.allocate((*name).to_owned(), data, Some((public, Some(position))))?;
            self.install_edges(id)?;
        }
        self.changed(public);
        Ok(public)
    }

    /// Fluent construction of a UDT and its members in one step.
    pub fn udt_builder(&mut self, name: &str, kind: UdtKind) -> UdtBuilder<'_> {
        UdtBuilder {
            set: self,
            name: name.to_owned(),
            kind,
            members: Vec::new(),
        }
    }

    pub fn enum_builder(&mut self, name: &str, underlying: Option<SymbolId>) -> EnumBuilder<'_> {
        EnumBuilder {
            set: self,
            name: name.to_owned(),
            underlying,
            members: Vec::new(),
        }
    }

    /// Deletes a half-built owner after a member failed to commit.
    fn roll_back(&mut self, id: SymbolId) {
        if let Err(err) = self.delete_symbol(id) {
            warn!(%id, %err, "builder rollback failed");
        }
    }
}

enum PendingMember {
    Field {
        name: String,
        ty: SymbolId,
        placement: FieldPlacement,
        bit_field: Option<BitField>,
    },
    Base {
        ty: SymbolId,
        placement: FieldPlacement,
    },
}

pub struct UdtBuilder<'a> {
    set: &'a mut SymbolSet,
    name: String,
    kind: UdtKind,
    members: Vec<PendingMember>,
}

impl<'a> UdtBuilder<'a> {
    pub fn base(mut self, ty: SymbolId) -> Self {
        self.members.push(PendingMember::Base {
            ty,
            placement: FieldPlacement::AutomaticAppend,
        });
        self
    }

    pub fn field(self, name: impl AsRef<str>, ty: SymbolId) -> Self {
        self.member(name, ty, FieldPlacement::AutomaticAppend, None)
    }

    pub fn field_at(self, name: impl AsRef<str>, ty: SymbolId, offset: u64) -> Self {
        self.member(name, ty, FieldPlacement::Offset(offset), None)
    }

    pub fn bit_field(self, name: impl AsRef<str>, ty: SymbolId, offset: u64, bits: BitField) -> Self {
        self.member(name, ty, FieldPlacement::Offset(offset), Some(bits))
    }

    pub fn constant(self, name: impl AsRef<str>, ty: SymbolId, value: ConstValue) -> Self {
        self.member(name, ty, FieldPlacement::Constant(value), None)
    }

    fn member(
        mut self,
        name: impl AsRef<str>,
        ty: SymbolId,
        placement: FieldPlacement,
        bit_field: Option<BitField>,
    ) -> Self {
        self.members.push(PendingMember::Field {
            name: name.as_ref().to_owned(),
            ty,
            placement,
            bit_field,
        });
        self
    }

    /// Creates the UDT and its members; on any failure nothing is left behind.
    pub fn finish(self) -> SymbolResult<SymbolId> {
        let UdtBuilder {
            set,
            name,
            kind,
            members,
        } = self;
        let udt = set.create_udt(&name, kind)?;
        for member in members {
            let result = match member {
                PendingMember::Field {
                    name,
                    ty,
                    placement,
                    bit_field,
                } => set
                    .create_field(udt, placement, ty, &name)
                    .and_then(|field| match bit_field {
                        Some(bits) => set.set_bit_field(field, Some(bits)),
                        None => Ok(()),
                    }),
                PendingMember::Base { ty, placement } => {
                    set.create_base_class(udt, placement, ty).map(|_| ())
                }
            };
            if let Err(err) = result {
                set.roll_back(udt);
                return Err(err);
            }
        }
        Ok(udt)
    }
}

pub struct EnumBuilder<'a> {
    set: &'a mut SymbolSet,
    name: String,
    underlying: Option<SymbolId>,
    members: Vec<(String, Option<ConstValue>)>,
}

impl<'a> EnumBuilder<'a> {
    pub fn member(mut self, name: impl AsRef<str>) -> Self {
        self.members.push((name.as_ref().to_owned(), None));
        self
    }

    pub fn member_value(mut self, name: impl AsRef<str>, value: ConstValue) -> Self {
        self.members.push((name.as_ref().to_owned(), Some(value)));
        self
    }

    pub fn finish(self) -> SymbolResult<SymbolId> {
        let EnumBuilder {
            set,
            name,
            underlying,
            members,
        } = self;
        let id = set.create_enum(&name, underlying)?;
        for (member, value) in members {
            if let Err(err) = set.create_enumerant(id, &member, value) {
                set.roll_back(id);
                return Err(err);
            }
        }
        Ok(id)
    }
}
