//! Entry point for the `prog::import` subsystem: the foreign backend contract and the
//! lazy importer that merges its answers into a symbol set.

pub mod backend;
pub mod importer;
pub mod memory;
pub mod table_backend;
pub mod unwind;

pub use backend::{
    BackendError, BackendResult, ForeignDataKind, ForeignHandle, ForeignSymbol, ForeignTag,
    ImportOptions, SymbolBackend,
};
pub use importer::{ImportOutcome, Importer, ImporterState};
pub use memory::{ImageMemory, MemoryReader, NoMemory};
pub use table_backend::StaticBackend;
