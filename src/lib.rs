//! In-memory synthetic symbol graph: program types and data authored at runtime, laid out
//! automatically, and optionally backfilled on demand from a foreign symbol backend.

pub mod error;
pub mod prog;
pub mod registry;

pub use error::{SymbolError, SymbolResult};
pub use prog::import::{BackendError, ImportOptions, Importer, SymbolBackend};
pub use prog::symbols::{SymbolId, SymbolSet, SymbolSetConfig};
pub use registry::{ModuleKey, ProcessKey, SymbolRegistry};
