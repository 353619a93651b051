//! Canonical type records stored on type symbols.

use crate::prog::symbols::SymbolId;

use super::array::ArrayType;
use super::basic::{BasicType, EnumType};
use super::callable::FunctionType;
use super::pointer::PointerType;
use super::udt::UdtType;

/// Computed byte size and alignment of a type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutSize {
    pub bytes: u64,
    pub align: u64,
}

impl LayoutSize {
    /// Layout of a type that has not been laid out yet.
    pub const UNSET: Self = Self { bytes: 0, align: 1 };

    pub fn new(bytes: u64, align: u64) -> Self {
        Self {
            bytes,
            align: align.max(1),
        }
    }
}

impl Default for LayoutSize {
    fn default() -> Self {
        Self::UNSET
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Basic,
    Udt,
    Pointer,
    Array,
    Typedef,
    Enum,
    Function,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedefType {
    pub target: SymbolId,
}

/// All supported type shapes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeRecord {
    Basic(BasicType),
    Udt(UdtType),
    Pointer(PointerType),
    Array(ArrayType),
    Typedef(TypedefType),
    Enum(EnumType),
    Function(FunctionType),
}

impl TypeRecord {
    pub fn kind(&self) -> TypeKind {
        match self {
            TypeRecord::Basic(_) => TypeKind::Basic,
            TypeRecord::Udt(_) => TypeKind::Udt,
            TypeRecord::Pointer(_) => TypeKind::Pointer,
            TypeRecord::Array(_) => TypeKind::Array,
            TypeRecord::Typedef(_) => TypeKind::Typedef,
            TypeRecord::Enum(_) => TypeKind::Enum,
            TypeRecord::Function(_) => TypeKind::Function,
        }
    }

    pub fn as_basic(&self) -> Option<&BasicType> {
        if let TypeRecord::Basic(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Other types this record refers to by id.
    pub fn referenced_types(&self) -> Vec<SymbolId> {
        match self {
            TypeRecord::Basic(_) | TypeRecord::Udt(_) => Vec::new(),
            TypeRecord::Pointer(pointer) => vec![pointer.pointee],
            TypeRecord::Array(array) => vec![array.element],
            TypeRecord::Typedef(typedef) => vec![typedef.target],
            TypeRecord::Enum(enum_ty) => vec![enum_ty.underlying],
            TypeRecord::Function(function) => function
                .return_type
                .into_iter()
                .chain(function.params.iter().copied())
                .collect(),
        }
    }

    /// Whether instances of this type are named entries of the global type index.
    pub(crate) fn is_named_kind(&self) -> bool {
        matches!(
            self,
            TypeRecord::Basic(_) | TypeRecord::Udt(_) | TypeRecord::Typedef(_) | TypeRecord::Enum(_)
        )
    }
}

/// Payload of a type symbol: its record plus the layout computed for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeSymbol {
    pub record: TypeRecord,
    pub layout: LayoutSize,
}

impl TypeSymbol {
    pub fn new(record: TypeRecord, layout: LayoutSize) -> Self {
        Self { record, layout }
    }

    pub fn kind(&self) -> TypeKind {
        self.record.kind()
    }

    pub fn size(&self) -> u64 {
        self.layout.bytes
    }

    pub fn align(&self) -> u64 {
        self.layout.align
    }
}
