//! Core symbol data structures: the shared base plus the closed set of entity kinds.

use std::ops::Range;

use smallvec::SmallVec;

use crate::prog::types::{ConstValue, TypeSymbol};

use super::id::SymbolId;
use super::source::SymbolSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolTag {
    Type,
    Field,
    BaseClass,
    Data,
    Function,
    Parameter,
    Local,
    Public,
}

/// Declared placement of a positional symbol within its owner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldPlacement {
    /// Explicit byte offset from the start of the owner.
    Offset(u64),
    /// Placed after the previous sibling per alignment rules.
    AutomaticAppend,
    /// Fixed constant value; occupies no storage.
    Constant(ConstValue),
    /// Previous sibling's value plus one, starting at zero (enum members only).
    AutomaticIncrement,
}

impl FieldPlacement {
    pub fn is_value_based(&self) -> bool {
        matches!(
            self,
            FieldPlacement::Constant(_) | FieldPlacement::AutomaticIncrement
        )
    }

    pub fn constant(&self) -> Option<ConstValue> {
        match self {
            FieldPlacement::Constant(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_automatic(&self) -> bool {
        matches!(
            self,
            FieldPlacement::AutomaticAppend | FieldPlacement::AutomaticIncrement
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitField {
    pub position: u32,
    pub length: u32,
}

/// Field or base class. The declared placement is kept apart from the values the layout
/// engine resolved so callers can tell "explicit" from "computed".
#[derive(Clone, Debug, PartialEq)]
pub struct PositionalSymbol {
    pub ty: SymbolId,
    pub placement: FieldPlacement,
    pub actual_offset: Option<u64>,
    pub actual_value: Option<ConstValue>,
    pub bit_field: Option<BitField>,
}

impl PositionalSymbol {
    pub fn new(ty: SymbolId, placement: FieldPlacement) -> Self {
        Self {
            ty,
            placement,
            actual_offset: None,
            actual_value: None,
            bit_field: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GlobalLocation {
    /// Image-relative byte offset.
    ImageOffset(u64),
    Constant(ConstValue),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GlobalSymbol {
    pub ty: SymbolId,
    pub location: GlobalLocation,
    pub(crate) registered: Option<Range<u64>>,
}

/// Where a variable lives over one live range. Register numbering belongs to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocationDesc {
    Register(u16),
    RegisterRelative { register: u16, offset: i64 },
    ImageOffset(u64),
}

/// Sub-range of the owning function's code, relative to the function's first byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiveRange {
    pub offset: u64,
    pub size: u64,
    pub location: LocationDesc,
}

impl LiveRange {
    pub fn new(offset: u64, size: u64, location: LocationDesc) -> Self {
        Self {
            offset,
            size,
            location,
        }
    }

    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    pub fn overlaps(&self, other: &LiveRange) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableSymbol {
    pub ty: SymbolId,
    pub live_ranges: Vec<LiveRange>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionSymbol {
    pub return_type: SymbolId,
    /// Disjoint image-relative code ranges; the first one holds the entry point.
    pub ranges: SmallVec<[Range<u64>; 1]>,
    pub(crate) registered: SmallVec<[Range<u64>; 1]>,
}

impl FunctionSymbol {
    pub fn entry(&self) -> Option<u64> {
        self.ranges.first().map(|range| range.start)
    }

    pub fn code_size(&self) -> u64 {
        self.ranges.iter().map(|range| range.end - range.start).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicSymbol {
    pub offset: u64,
}

/// Kind-specific payload. Every site that boxes or unboxes a symbol matches on this.
#[derive(Clone, Debug, PartialEq)]
pub enum SymbolData {
    Type(TypeSymbol),
    Field(PositionalSymbol),
    BaseClass(PositionalSymbol),
    Global(GlobalSymbol),
    Function(FunctionSymbol),
    Parameter(VariableSymbol),
    Local(VariableSymbol),
    Public(PublicSymbol),
}

impl SymbolData {
    pub fn tag(&self) -> SymbolTag {
        match self {
            SymbolData::Type(_) => SymbolTag::Type,
            SymbolData::Field(_) => SymbolTag::Field,
            SymbolData::BaseClass(_) => SymbolTag::BaseClass,
            SymbolData::Global(_) => SymbolTag::Data,
            SymbolData::Function(_) => SymbolTag::Function,
            SymbolData::Parameter(_) => SymbolTag::Parameter,
            SymbolData::Local(_) => SymbolTag::Local,
            SymbolData::Public(_) => SymbolTag::Public,
        }
    }

    /// Type ids this payload refers to.
    pub fn referenced_types(&self) -> Vec<SymbolId> {
        match self {
            SymbolData::Type(ty) => ty.record.referenced_types(),
            SymbolData::Field(pos) | SymbolData::BaseClass(pos) => vec![pos.ty],
            SymbolData::Global(global) => vec![global.ty],
            SymbolData::Function(function) => vec![function.return_type],
            SymbolData::Parameter(var) | SymbolData::Local(var) => vec![var.ty],
            SymbolData::Public(_) => Vec::new(),
        }
    }
}

/// Common base shared by all entities in the graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub(crate) id: SymbolId,
    pub(crate) parent: Option<SymbolId>,
    pub(crate) children: Vec<SymbolId>,
    pub(crate) name: String,
    pub(crate) qualified_name: Option<String>,
    pub(crate) dependents: SmallVec<[SymbolId; 4]>,
    pub(crate) source: SymbolSource,
    pub(crate) data: SymbolData,
}

impl Symbol {
    pub(crate) fn new(id: SymbolId, name: String, source: SymbolSource, data: SymbolData) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            name,
            qualified_name: None,
            dependents: SmallVec::new(),
            source,
            data,
        }
    }

    pub fn id(&self) -> SymbolId {
        self.id
    }

    pub fn parent(&self) -> Option<SymbolId> {
        self.parent
    }

    pub fn children(&self) -> &[SymbolId] {
        &self.children
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> Option<&str> {
        self.qualified_name.as_deref()
    }

    pub fn dependents(&self) -> &[SymbolId] {
        &self.dependents
    }

    pub fn source(&self) -> SymbolSource {
        self.source
    }

    pub fn tag(&self) -> SymbolTag {
        self.data.tag()
    }

    pub fn data(&self) -> &SymbolData {
        &self.data
    }

    pub fn as_type(&self) -> Option<&TypeSymbol> {
        if let SymbolData::Type(ty) = &self.data {
            Some(ty)
        } else {
            None
        }
    }

    pub fn as_positional(&self) -> Option<&PositionalSymbol> {
        match &self.data {
            SymbolData::Field(pos) | SymbolData::BaseClass(pos) => Some(pos),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&VariableSymbol> {
        match &self.data {
            SymbolData::Parameter(var) | SymbolData::Local(var) => Some(var),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionSymbol> {
        if let SymbolData::Function(function) = &self.data {
            Some(function)
        } else {
            None
        }
    }

    pub fn as_global(&self) -> Option<&GlobalSymbol> {
        if let SymbolData::Global(global) = &self.data {
            Some(global)
        } else {
            None
        }
    }

    /// Whether the symbol belongs in the module-wide name index.
    pub(crate) fn is_name_indexed(&self) -> bool {
        if self.name.is_empty() || self.parent.is_some() {
            return false;
        }
        match &self.data {
            SymbolData::Type(ty) => ty.record.is_named_kind(),
            SymbolData::Global(_) | SymbolData::Function(_) => true,
            SymbolData::Field(_)
            | SymbolData::BaseClass(_)
            | SymbolData::Parameter(_)
            | SymbolData::Local(_)
            | SymbolData::Public(_) => false,
        }
    }
}
