mod common;
mod importer;
mod layout;
