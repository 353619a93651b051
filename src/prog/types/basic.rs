//! Intrinsic scalar types, the built-in name table, and enumeration records.

use crate::prog::symbols::SymbolId;

use super::value::VariantPacking;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasicEncoding {
    Void,
    Bool,
    Char,
    WideChar,
    Signed,
    Unsigned,
    Float,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicType {
    pub encoding: BasicEncoding,
    pub byte_size: u64,
}

impl BasicType {
    pub fn new(encoding: BasicEncoding, byte_size: u64) -> Self {
        Self {
            encoding,
            byte_size,
        }
    }

    /// Natural alignment; `void` and other zero-sized intrinsics align to one.
    pub fn alignment(&self) -> u64 {
        self.byte_size.max(1)
    }

    /// Packing code used to store constants of this type, if it has one.
    pub fn packing(&self) -> Option<VariantPacking> {
        let packing = match (self.encoding, self.byte_size) {
            (BasicEncoding::Void, _) => return None,
            (BasicEncoding::Bool, 1) => VariantPacking::Bool,
            (BasicEncoding::Signed | BasicEncoding::Char, 1) => VariantPacking::I1,
            (BasicEncoding::Unsigned, 1) => VariantPacking::UI1,
            (BasicEncoding::Signed, 2) => VariantPacking::I2,
            (BasicEncoding::Unsigned | BasicEncoding::WideChar, 2) => VariantPacking::UI2,
            (BasicEncoding::Signed, 4) => VariantPacking::I4,
            (BasicEncoding::Unsigned | BasicEncoding::WideChar, 4) => VariantPacking::UI4,
            (BasicEncoding::Signed, 8) => VariantPacking::I8,
            (BasicEncoding::Unsigned, 8) => VariantPacking::UI8,
            (BasicEncoding::Float, 4) => VariantPacking::R4,
            (BasicEncoding::Float, 8) => VariantPacking::R8,
            _ => return None,
        };
        Some(packing)
    }

    pub fn is_integral(&self) -> bool {
        self.packing().is_some_and(VariantPacking::is_integral)
    }
}

/// Entry of the table consulted when a lookup may synthesize an intrinsic type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuiltinType {
    pub name: &'static str,
    pub encoding: BasicEncoding,
    pub byte_size: u64,
}

const fn builtin_entry(name: &'static str, encoding: BasicEncoding, byte_size: u64) -> BuiltinType {
    BuiltinType {
        name,
        encoding,
        byte_size,
    }
}

pub const BUILTIN_TYPES: &[BuiltinType] = &[
    builtin_entry("void", BasicEncoding::Void, 0),
    builtin_entry("bool", BasicEncoding::Bool, 1),
    builtin_entry("char", BasicEncoding::Char, 1),
    builtin_entry("signed char", BasicEncoding::Signed, 1),
    builtin_entry("unsigned char", BasicEncoding::Unsigned, 1),
    builtin_entry("wchar_t", BasicEncoding::WideChar, 2),
    builtin_entry("char16_t", BasicEncoding::WideChar, 2),
    builtin_entry("char32_t", BasicEncoding::WideChar, 4),
    builtin_entry("short", BasicEncoding::Signed, 2),
    builtin_entry("unsigned short", BasicEncoding::Unsigned, 2),
    builtin_entry("int", BasicEncoding::Signed, 4),
    builtin_entry("unsigned int", BasicEncoding::Unsigned, 4),
    builtin_entry("long", BasicEncoding::Signed, 4),
    builtin_entry("unsigned long", BasicEncoding::Unsigned, 4),
    builtin_entry("long long", BasicEncoding::Signed, 8),
    builtin_entry("unsigned long long", BasicEncoding::Unsigned, 8),
    builtin_entry("__int64", BasicEncoding::Signed, 8),
    builtin_entry("unsigned __int64", BasicEncoding::Unsigned, 8),
    builtin_entry("int8_t", BasicEncoding::Signed, 1),
    builtin_entry("uint8_t", BasicEncoding::Unsigned, 1),
    builtin_entry("int16_t", BasicEncoding::Signed, 2),
    builtin_entry("uint16_t", BasicEncoding::Unsigned, 2),
    builtin_entry("int32_t", BasicEncoding::Signed, 4),
    builtin_entry("uint32_t", BasicEncoding::Unsigned, 4),
    builtin_entry("int64_t", BasicEncoding::Signed, 8),
    builtin_entry("uint64_t", BasicEncoding::Unsigned, 8),
    builtin_entry("float", BasicEncoding::Float, 4),
    builtin_entry("double", BasicEncoding::Float, 8),
];

pub fn builtin(name: &str) -> Option<&'static BuiltinType> {
    BUILTIN_TYPES.iter().find(|entry| entry.name == name)
}

/// Enumeration record. Members live as value-based positional children of the enum symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumType {
    pub underlying: SymbolId,
    pub packing: VariantPacking,
    pub intrinsic: BasicEncoding,
}

impl EnumType {
    pub fn new(underlying: SymbolId, base: &BasicType) -> Option<Self> {
        let packing = base.packing().filter(|packing| packing.is_integral())?;
        Some(Self {
            underlying,
            packing,
            intrinsic: base.encoding,
        })
    }
}
