//! Identifier helpers used by the symbol subsystem.

use std::fmt;
use std::num::NonZeroU64;

/// Dense, never-reused identifier of a symbol within one graph. Zero is reserved as the
/// "no symbol" sentinel, so ids map to arena slots as `index + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(NonZeroU64);

impl SymbolId {
    pub fn new(value: NonZeroU64) -> Self {
        Self(value)
    }

    pub fn from_u64(value: u64) -> Option<Self> {
        NonZeroU64::new(value).map(Self)
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(NonZeroU64::MIN.saturating_add(index as u64))
    }

    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
