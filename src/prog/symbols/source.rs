//! Bitflag helpers describing where a symbol came from and what an import query covers.

use bitflags::bitflags;

bitflags! {
    /// Provenance of a symbol.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SymbolSource: u32 {
        const MANUAL = 0b0001;
        const IMPORTED = 0b0010;
        /// Created without a named foreign counterpart (e.g. recovered from unwind data).
        const SYNTHESIZED = 0b0100;
    }
}

bitflags! {
    /// Categories of symbols a lookup or import query is interested in.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SearchKind: u32 {
        const TYPES = 0b0001;
        const DATA = 0b0010;
        const FUNCTIONS = 0b0100;
        const PUBLICS = 0b1000;
    }
}

impl SearchKind {
    /// Everything that can live at an address.
    pub const ADDRESSABLE: Self = Self::DATA.union(Self::FUNCTIONS).union(Self::PUBLICS);
}
