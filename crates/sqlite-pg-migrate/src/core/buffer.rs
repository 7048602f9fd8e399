//! In-memory columnar buffer for one extracted table.

use crate::error::{MigrateError, Result};

use super::value::CellValue;

/// One named column of a [`TabularBuffer`].
#[derive(Debug, Clone, PartialEq)]
pub struct BufferColumn {
    /// Column name as the source reported it.
    pub name: String,
    /// Values, one per row.
    pub values: Vec<CellValue>,
}

/// Whole-table extract held in memory.
///
/// Columns keep the source's names and order. Every column holds exactly
/// `num_rows()` values; `push_row` refuses rows of the wrong width.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularBuffer {
    table: String,
    columns: Vec<BufferColumn>,
    rows: usize,
}

impl TabularBuffer {
    /// Create an empty buffer with the given column names.
    pub fn new(table: impl Into<String>, column_names: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns: column_names
                .into_iter()
                .map(|name| BufferColumn {
                    name,
                    values: Vec::new(),
                })
                .collect(),
            rows: 0,
        }
    }

    /// Build a buffer from column names and row-major values.
    pub fn from_rows(
        table: impl Into<String>,
        column_names: Vec<String>,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self> {
        let mut buffer = Self::new(table, column_names);
        buffer.reserve(rows.len());
        for row in rows {
            buffer.push_row(row)?;
        }
        Ok(buffer)
    }

    /// Reserve space for `additional` rows in every column.
    pub fn reserve(&mut self, additional: usize) {
        for col in &mut self.columns {
            col.values.reserve(additional);
        }
    }

    /// Append one row.
    pub fn push_row(&mut self, row: Vec<CellValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(MigrateError::transfer(
                &self.table,
                format!(
                    "row {} has {} values, expected {}",
                    self.rows,
                    row.len(),
                    self.columns.len()
                ),
            ));
        }

        for (col, value) in self.columns.iter_mut().zip(row) {
            col.values.push(value);
        }
        self.rows += 1;
        Ok(())
    }

    /// Name of the table this buffer was extracted from.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column names in source order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> &[BufferColumn] {
        &self.columns
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Value at `(row, column)`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn value(&self, row: usize, column: usize) -> &CellValue {
        &self.columns[column].values[row]
    }
}
