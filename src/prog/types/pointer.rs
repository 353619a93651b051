//! Pointer and reference records.

use crate::prog::symbols::SymbolId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Standard,
    Reference,
    RValueReference,
    /// Managed handle (`T ^`).
    ManagedHat,
}

impl PointerKind {
    pub fn suffix(self) -> &'static str {
        match self {
            PointerKind::Standard => "*",
            PointerKind::Reference => "&",
            PointerKind::RValueReference => "&&",
            PointerKind::ManagedHat => "^",
        }
    }

    /// Longest suffixes first so `&&` is not read as `&`.
    pub(crate) fn from_suffix(text: &str) -> Option<(&str, Self)> {
        const ORDER: [PointerKind; 4] = [
            PointerKind::RValueReference,
            PointerKind::Standard,
            PointerKind::Reference,
            PointerKind::ManagedHat,
        ];
        ORDER.iter().find_map(|kind| {
            text.strip_suffix(kind.suffix())
                .map(|rest| (rest.trim_end(), *kind))
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointerType {
    pub pointee: SymbolId,
    pub kind: PointerKind,
}

impl PointerType {
    pub fn new(pointee: SymbolId, kind: PointerKind) -> Self {
        Self { pointee, kind }
    }
}
