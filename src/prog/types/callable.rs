//! Function signature records.

use crate::prog::symbols::SymbolId;

/// A return type of `None` means the signature has not been completed yet (or returns
/// nothing); the importer registers signatures before resolving their parts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionType {
    pub return_type: Option<SymbolId>,
    pub params: Vec<SymbolId>,
}

impl FunctionType {
    pub fn new(return_type: Option<SymbolId>, params: Vec<SymbolId>) -> Self {
        Self {
            return_type,
            params,
        }
    }

    pub fn references(&self, id: SymbolId) -> bool {
        self.return_type == Some(id) || self.params.contains(&id)
    }
}
