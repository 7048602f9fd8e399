//! Value adaptation between SQLite storage classes and PostgreSQL parameters.
//!
//! Adaptation never fails. Out-of-range integers and nulls are ordinary
//! branches: an integer that does not fit the destination's native `integer`
//! is carried as its exact decimal string and cast to the column type by the
//! insert, and NULL/NaN both become SQL NULL.

use crate::core::value::{BindValue, CellValue};

/// Adapt one source cell for binding into a destination insert.
pub fn adapt(value: &CellValue) -> BindValue {
    match value {
        CellValue::Null => BindValue::Null,
        CellValue::Integer(v) => adapt_integer(*v),
        CellValue::Real(v) => adapt_float(*v),
        CellValue::Text(s) => BindValue::Text(s.clone()),
        CellValue::Blob(b) => BindValue::Bytes(b.clone()),
    }
}

/// Exact integer when it fits `integer`, decimal string otherwise.
pub fn adapt_integer(v: i64) -> BindValue {
    match i32::try_from(v) {
        Ok(n) => BindValue::Integer(n),
        Err(_) => BindValue::DecimalText(v.to_string()),
    }
}

/// NaN has no SQL counterpart other than NULL.
pub fn adapt_float(v: f64) -> BindValue {
    if v.is_nan() {
        BindValue::Null
    } else {
        BindValue::Float(v)
    }
}
