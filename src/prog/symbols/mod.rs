//! Entry point for the `prog::symbols` subsystem.

pub mod builder;
pub mod config;
mod deps;
pub mod edit;
pub mod fmt;
pub mod id;
pub mod query;
pub mod range;
pub mod source;
pub mod symbol;
pub mod table;

pub use builder::{EnumBuilder, UdtBuilder};
pub use config::{ModuleInfo, SymbolSetConfig};
pub use fmt::{SymbolFormatter, describe_symbol, type_name};
pub use id::SymbolId;
pub use query::{ChildCursor, SymbolCursor};
pub use range::{RangeEntry, RangeIndex};
pub use source::{SearchKind, SymbolSource};
pub use symbol::{
    BitField, FieldPlacement, FunctionSymbol, GlobalLocation, GlobalSymbol, LiveRange, LocationDesc,
    PositionalSymbol, PublicSymbol, Symbol, SymbolData, SymbolTag, VariableSymbol,
};
pub use table::{InvalidationSink, SymbolSet};

#[cfg(test)]
mod tests {
    //! Surface-level smoke test proving the module wiring works end-to-end.
    use super::*;
    use crate::prog::types::{BasicEncoding, UdtKind};

    #[test]
    fn module_reexports_allow_builder_usage() {
        let mut set = SymbolSet::new(ModuleInfo::new("app", 0x1000, 0x100));
        let int = set
            .create_basic_type("int", BasicEncoding::Signed, 4)
            .expect("int");
        let temp = set
            .udt_builder("Temp", UdtKind::Struct)
            .field("celsius", int)
            .finish()
            .expect("udt");
        assert_eq!(set.len(), 3, "type, UDT, and one field should be live");
        let rendered = describe_symbol(&set, temp).to_string();
        assert!(rendered.contains("Temp"), "formatter re-export should be usable from the root module");
    }
}
