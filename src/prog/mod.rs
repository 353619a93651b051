//! Entry point for the `prog` subsystem: type records, the symbol graph, and the importer.

pub mod import;
pub mod symbols;
pub mod types;
