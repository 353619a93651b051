//! Configuration for a symbol graph and the module it describes.

/// Module a symbol graph covers. Offsets stored in the graph are relative to `base`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub base: u64,
    pub size: u64,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>, base: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            base,
            size,
        }
    }

    /// Converts an absolute address into a module-relative offset.
    pub fn offset_of(&self, address: u64) -> Option<u64> {
        let offset = address.checked_sub(self.base)?;
        (self.size == 0 || offset < self.size).then_some(offset)
    }

    pub fn address_of(&self, offset: u64) -> u64 {
        self.base.wrapping_add(offset)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolSetConfig {
    /// Byte size (and alignment) of every pointer flavor.
    pub pointer_size: u64,
    /// Whether name lookups may synthesize built-in intrinsic types on a miss.
    pub auto_create_builtins: bool,
}

impl Default for SymbolSetConfig {
    fn default() -> Self {
        Self {
            pointer_size: 8,
            auto_create_builtins: true,
        }
    }
}
