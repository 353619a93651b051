//! Error surface shared by the symbol graph, the layout engine, and the importer.

use thiserror::Error;

use crate::prog::import::BackendError;

pub type SymbolResult<T> = Result<T, SymbolError>;

/// Failure categories reported by graph operations.
///
/// Creation and mutation validate every reference before touching state, so any error
/// returned from a primary operation means the graph is unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SymbolError {
    /// A referenced owner or type is missing or of the wrong kind.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A name, id, or offset lookup missed.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation or foreign symbol category is recognized but unsupported.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// An internal invariant did not hold (e.g. a child id missing from the table).
    #[error("unexpected internal state: {0}")]
    Unexpected(String),

    /// The request conflicts with how the symbol is declared.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("symbol backend error: {0}")]
    Backend(#[from] BackendError),
}

impl SymbolError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SymbolError::InvalidArgument(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        SymbolError::NotFound(message.into())
    }

    pub(crate) fn constraint(message: impl Into<String>) -> Self {
        SymbolError::ConstraintViolation(message.into())
    }

    pub(crate) fn unexpected(message: impl Into<String>) -> Self {
        SymbolError::Unexpected(message.into())
    }

    pub(crate) fn not_implemented(message: impl Into<String>) -> Self {
        SymbolError::NotImplemented(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SymbolError::NotFound(_))
    }
}
