//! Flat-file I/O layer
//!
//! - [`table_format`] - Pure line-level parse/format for every record table
//! - [`record_store`] - File resolution, table scans, append and rewrite paths

pub mod record_store;
pub mod table_format;

pub use record_store::{RecordStore, TableKind};
