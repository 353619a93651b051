//! Fixed-count array records.

use crate::prog::symbols::SymbolId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayType {
    pub element: SymbolId,
    pub count: u64,
}

impl ArrayType {
    pub fn new(element: SymbolId, count: u64) -> Self {
        Self { element, count }
    }

    pub fn byte_size(&self, element_size: u64) -> u64 {
        element_size.saturating_mul(self.count)
    }

    /// Splits a trailing `[N]` off a type name.
    pub(crate) fn parse_suffix(text: &str) -> Option<(&str, u64)> {
        let inner = text.strip_suffix(']')?;
        let open = inner.rfind('[')?;
        let count = inner[open + 1..].trim().parse().ok()?;
        Some((inner[..open].trim_end(), count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_scales_with_count() {
        let array = ArrayType::new(SymbolId::from_u64(3).expect("non-zero"), 5);
        assert_eq!(array.byte_size(4), 20, "five four-byte elements take twenty bytes");
    }

    #[test]
    fn suffix_parsing_reads_innermost_count() {
        assert_eq!(ArrayType::parse_suffix("int[4]"), Some(("int", 4)));
        assert_eq!(ArrayType::parse_suffix("Foo *[2]"), Some(("Foo *", 2)));
        assert_eq!(ArrayType::parse_suffix("int[x]"), None);
    }
}
