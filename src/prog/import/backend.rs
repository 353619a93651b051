//! Contract of the foreign symbol backend the importer bridges from.
//!
//! A backend hands out opaque per-session handles and describes each one on request; it
//! knows nothing about the synthetic graph it is being merged into.

use std::ops::Range;
use std::sync::Arc;

use thiserror::Error;

use crate::prog::symbols::{BitField, ModuleInfo, SearchKind};
use crate::prog::types::{BasicEncoding, ConstValue, UdtKind};

use super::memory::MemoryReader;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend session is not connected")]
    NotConnected,
    #[error("backend failure: {0}")]
    Failed(String),
    #[error("memory read of {len} bytes at 0x{address:X} failed")]
    MemoryRead { address: u64, len: usize },
    #[error("backend does not support {0}")]
    NotImplemented(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Opaque index of a symbol within one backend session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForeignHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForeignDataKind {
    Global,
    /// Static class member or file static.
    Static,
    Member,
    Parameter,
    Local,
    Constant,
}

/// Category of a foreign symbol as reported by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForeignTag {
    BaseType(BasicEncoding),
    Udt(UdtKind),
    Enum,
    Pointer,
    Array,
    Typedef,
    FunctionType,
    FunctionArg,
    Data(ForeignDataKind),
    Function,
    BaseClass { is_virtual: bool },
    Public,
    /// A category the backend knows but this crate does not model.
    Other(u32),
}

impl ForeignTag {
    /// Which query kind enumerates symbols of this category at top level.
    pub fn search_kind(&self) -> Option<SearchKind> {
        match self {
            ForeignTag::BaseType(_)
            | ForeignTag::Udt(_)
            | ForeignTag::Enum
            | ForeignTag::Pointer
            | ForeignTag::Array
            | ForeignTag::Typedef
            | ForeignTag::FunctionType => Some(SearchKind::TYPES),
            ForeignTag::Data(ForeignDataKind::Global | ForeignDataKind::Static) => {
                Some(SearchKind::DATA)
            }
            ForeignTag::Function => Some(SearchKind::FUNCTIONS),
            ForeignTag::Public => Some(SearchKind::PUBLICS),
            ForeignTag::Data(_)
            | ForeignTag::FunctionArg
            | ForeignTag::BaseClass { .. }
            | ForeignTag::Other(_) => None,
        }
    }
}

/// Type-introspection answer for one handle.
#[derive(Clone, Debug, PartialEq)]
pub struct ForeignSymbol {
    pub tag: ForeignTag,
    pub name: String,
    pub size: u64,
    /// Underlying type: pointee, element, typedef target, enum storage, data type, or a
    /// function's signature.
    pub base_type: Option<ForeignHandle>,
    /// Byte offset within the owner, for members and base classes.
    pub offset: Option<u64>,
    pub bit_field: Option<BitField>,
    pub constant: Option<ConstValue>,
    /// Absolute address for globals, functions, and publics.
    pub address: Option<u64>,
    pub is_reference: bool,
    pub count: Option<u64>,
    /// Array rank; only one-dimensional arrays are importable.
    pub dimensions: u32,
}

impl ForeignSymbol {
    pub fn new(tag: ForeignTag, name: impl Into<String>) -> Self {
        Self {
            tag,
            name: name.into(),
            size: 0,
            base_type: None,
            offset: None,
            bit_field: None,
            constant: None,
            address: None,
            is_reference: false,
            count: None,
            dimensions: 1,
        }
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn base(mut self, handle: ForeignHandle) -> Self {
        self.base_type = Some(handle);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn bits(mut self, position: u32, length: u32) -> Self {
        self.bit_field = Some(BitField { position, length });
        self
    }

    pub fn constant(mut self, value: ConstValue) -> Self {
        self.constant = Some(value);
        self
    }

    pub fn address(mut self, address: u64) -> Self {
        self.address = Some(address);
        self
    }

    pub fn reference(mut self) -> Self {
        self.is_reference = true;
        self
    }

    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = dimensions;
        self
    }
}

/// Search behavior requested from the backend when a session opens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportOptions {
    pub search_path: Option<String>,
    pub import_publics: bool,
    pub synthesize_from_unwind: bool,
    /// Name prefix for functions recovered from unwind data.
    pub synthesized_prefix: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            search_path: None,
            import_publics: true,
            synthesize_from_unwind: true,
            synthesized_prefix: "unnamed_fn".to_owned(),
        }
    }
}

pub trait SymbolBackend {
    /// Opens a session scoped to `module`. The backend resolves target memory through
    /// `memory` and nothing else.
    fn connect(
        &mut self,
        module: &ModuleInfo,
        options: &ImportOptions,
        memory: Arc<dyn MemoryReader>,
    ) -> BackendResult<()>;

    fn disconnect(&mut self);

    /// Top-level symbols of `kind` whose name matches `mask`; `None` matches everything.
    fn enumerate(&mut self, mask: Option<&str>, kind: SearchKind) -> BackendResult<Vec<ForeignHandle>>;

    fn lookup_by_address(&mut self, address: u64, kind: SearchKind) -> BackendResult<Option<ForeignHandle>>;

    fn describe(&mut self, handle: ForeignHandle) -> BackendResult<ForeignSymbol>;

    fn children(&mut self, handle: ForeignHandle) -> BackendResult<Vec<ForeignHandle>>;

    /// Absolute code extent recorded in unwind/exception metadata for `address`.
    fn unwind_range(&mut self, _address: u64) -> BackendResult<Option<Range<u64>>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_categories_map_to_search_kinds() {
        assert_eq!(ForeignTag::Udt(UdtKind::Struct).search_kind(), Some(SearchKind::TYPES));
        assert_eq!(
            ForeignTag::Data(ForeignDataKind::Global).search_kind(),
            Some(SearchKind::DATA)
        );
        assert_eq!(
            ForeignTag::Data(ForeignDataKind::Member).search_kind(),
            None,
            "members are only reachable through their owner"
        );
    }

    #[test]
    fn descriptor_builder_sets_optional_fields() {
        let symbol = ForeignSymbol::new(ForeignTag::Array, "")
            .base(ForeignHandle(3))
            .count(4)
            .size(16);
        assert_eq!(symbol.base_type, Some(ForeignHandle(3)));
        assert_eq!(symbol.count, Some(4));
        assert_eq!(symbol.dimensions, 1, "arrays default to a single dimension");
    }
}
