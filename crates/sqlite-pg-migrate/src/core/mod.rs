//! Core data model shared by the extractor, the type adapter and the loader.
//!
//! - [`value`]: source cell values and destination bind values
//! - [`buffer`]: the in-memory columnar extract of one table
//! - [`schema`]: static destination table declarations
//! - [`identifier`]: identifier validation and quoting

pub mod buffer;
pub mod identifier;
pub mod schema;
pub mod value;

pub use buffer::{BufferColumn, TabularBuffer};
pub use schema::{soccer_tables, ColumnSpec, TableSpec};
pub use value::{BindValue, CellValue};
