//! Cell values on both sides of the migration.
//!
//! [`CellValue`] is what the extractor reads from SQLite. Its variants follow
//! SQLite's storage classes. [`BindValue`] is what the row loader binds into a
//! PostgreSQL insert, produced by [`typemap::adapt`](crate::typemap::adapt).

/// A dynamically typed scalar read from the source store.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// SQL NULL.
    Null,

    /// 64-bit signed integer.
    Integer(i64),

    /// 64-bit floating point.
    Real(f64),

    /// UTF-8 text.
    Text(String),

    /// Raw bytes.
    Blob(Vec<u8>),
}

impl CellValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Storage class name, as SQLite reports it.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "NULL",
            CellValue::Integer(_) => "INTEGER",
            CellValue::Real(_) => "REAL",
            CellValue::Text(_) => "TEXT",
            CellValue::Blob(_) => "BLOB",
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Integer(v)
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        CellValue::Integer(i64::from(v))
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Real(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::Text(v)
    }
}

impl From<Vec<u8>> for CellValue {
    fn from(v: Vec<u8>) -> Self {
        CellValue::Blob(v)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// A value ready to be bound into a destination insert.
///
/// How it is encoded on the wire is decided by the destination column, not
/// by the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    /// Stored as SQL NULL.
    Null,

    /// Exact integer within the destination's native `integer` range.
    Integer(i32),

    /// Double precision float.
    Float(f64),

    /// Integer outside the native range, carried as its exact decimal string.
    DecimalText(String),

    /// Text passed through unchanged.
    Text(String),

    /// Bytes passed through unchanged.
    Bytes(Vec<u8>),
}

impl BindValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, BindValue::Null)
    }
}
