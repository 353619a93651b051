//! Formatting helpers for logs and host-facing to-string rendering.

use std::fmt;

use crate::prog::types::TypeRecord;

use super::id::SymbolId;
use super::symbol::{GlobalLocation, SymbolData};
use super::table::SymbolSet;

const MAX_TYPE_DEPTH: usize = 32;

/// C-like spelling of a type, e.g. `int *[4]` or `void (int, char *)`.
pub fn type_name(set: &SymbolSet, id: SymbolId) -> String {
    let mut out = String::new();
    write_type_name(set, id, 0, &mut out);
    out
}

fn write_type_name(set: &SymbolSet, id: SymbolId, depth: usize, out: &mut String) {
    if depth > MAX_TYPE_DEPTH {
        out.push_str("...");
        return;
    }
    let Some(symbol) = set.entry(id) else {
        out.push_str(&format!("<missing {id}>"));
        return;
    };
    let Some(ty) = symbol.as_type() else {
        out.push_str(&format!("<not a type {id}>"));
        return;
    };
    match &ty.record {
        TypeRecord::Udt(udt) if symbol.name.is_empty() => {
            out.push_str(&format!("<anonymous {}>", udt.kind.keyword()));
        }
        TypeRecord::Enum(_) if symbol.name.is_empty() => out.push_str("<anonymous enum>"),
        TypeRecord::Basic(_) | TypeRecord::Udt(_) | TypeRecord::Typedef(_) | TypeRecord::Enum(_) => {
            out.push_str(&symbol.name);
        }
        TypeRecord::Pointer(pointer) => {
            write_type_name(set, pointer.pointee, depth + 1, out);
            out.push(' ');
            out.push_str(pointer.kind.suffix());
        }
        TypeRecord::Array(array) => {
            write_type_name(set, array.element, depth + 1, out);
            out.push_str(&format!("[{}]", array.count));
        }
        TypeRecord::Function(function) => {
            match function.return_type {
                Some(ret) => write_type_name(set, ret, depth + 1, out),
                None => out.push_str("void"),
            }
            out.push_str(" (");
            for (index, param) in function.params.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_type_name(set, *param, depth + 1, out);
            }
            out.push(')');
        }
    }
}

pub struct SymbolFormatter<'a> {
    set: &'a SymbolSet,
    id: SymbolId,
}

impl<'a> SymbolFormatter<'a> {
    pub fn new(set: &'a SymbolSet, id: SymbolId) -> Self {
        Self { set, id }
    }
}

impl<'a> fmt::Display for SymbolFormatter<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(symbol) = self.set.entry(self.id) else {
            return write!(f, "<deleted {}>", self.id);
        };
        match &symbol.data {
            SymbolData::Type(ty) => {
                write!(f, "{}", type_name(self.set, self.id))?;
                write!(f, " | {:?}", ty.kind())?;
                write!(f, " [{} bytes, align {}]", ty.size(), ty.align())
            }
            SymbolData::Field(pos) | SymbolData::BaseClass(pos) => {
                write!(f, "{} | {:?}", symbol.name, symbol.tag())?;
                write!(f, " : {}", type_name(self.set, pos.ty))?;
                if let Some(offset) = pos.actual_offset {
                    write!(f, " @+0x{offset:X}")?;
                }
                if let Some(bits) = pos.bit_field {
                    write!(f, " bits {}:{}", bits.position, bits.length)?;
                }
                if let Some(value) = pos.actual_value {
                    write!(f, " = {value}")?;
                }
                Ok(())
            }
            SymbolData::Global(global) => {
                write!(f, "{} | Data : {}", symbol.name, type_name(self.set, global.ty))?;
                match global.location {
                    GlobalLocation::ImageOffset(offset) => write!(f, " @0x{offset:08X}"),
                    GlobalLocation::Constant(value) => write!(f, " = {value}"),
                }
            }
            SymbolData::Function(function) => {
                write!(f, "{} | Function -> {}", symbol.name, type_name(self.set, function.return_type))?;
                if let Some(entry) = function.entry() {
                    write!(f, " @0x{entry:08X}")?;
                }
                write!(f, " [{} bytes]", function.code_size())
            }
            SymbolData::Parameter(var) | SymbolData::Local(var) => {
                write!(f, "{} | {:?} : {}", symbol.name, symbol.tag(), type_name(self.set, var.ty))?;
                if !var.live_ranges.is_empty() {
                    write!(f, " ({} live ranges)", var.live_ranges.len())?;
                }
                Ok(())
            }
            SymbolData::Public(public) => write!(f, "{} | Public @0x{:08X}", symbol.name, public.offset),
        }
    }
}

pub fn describe_symbol(set: &SymbolSet, id: SymbolId) -> SymbolFormatter<'_> {
    SymbolFormatter::new(set, id)
}
