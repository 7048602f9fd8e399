//! In-memory [`TargetWriter`] for unit tests.
//!
//! Tables are snapshotted on `begin` and restored on `rollback`, so DDL and
//! rows are transactional the way they are in PostgreSQL.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{InsertOutcome, TargetColumn, TargetWriter};
use crate::core::schema::TableSpec;
use crate::core::value::BindValue;
use crate::error::{MigrateError, Result};

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryTable {
    pub columns: Vec<TargetColumn>,
    pub rows: Vec<BTreeMap<String, BindValue>>,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryTarget {
    pub schema: String,
    pub tables: BTreeMap<String, MemoryTable>,
    pub sequences: BTreeMap<(String, String), i64>,
    /// Every statement-level call, in order.
    pub log: Vec<String>,
    /// Refuse rows whose named column holds this value, like a foreign key would.
    pub reject_if: Option<(String, BindValue)>,
    /// Lose the connection on the n-th insert attempt (0-based).
    pub fatal_on_insert: Option<usize>,
    /// Fail `create_table` for this table.
    pub fail_create: Option<String>,
    pub fail_commit: bool,
    snapshot: Option<BTreeMap<String, MemoryTable>>,
    inserts_attempted: usize,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self {
            schema: "public".to_string(),
            ..Default::default()
        }
    }

    /// Add a table as if it had been created outside the migration.
    pub fn with_table(mut self, spec: &TableSpec) -> Self {
        self.tables.insert(spec.name.clone(), table_from_spec(spec));
        self
    }

    pub fn rows(&self, table: &str) -> &[BTreeMap<String, BindValue>] {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or_default()
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut MemoryTable> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| MigrateError::transfer(table, "relation does not exist"))
    }
}

fn table_from_spec(spec: &TableSpec) -> MemoryTable {
    MemoryTable {
        columns: spec
            .columns
            .iter()
            .map(|c| TargetColumn::new(&c.name, catalog_type(&c.sql_type)))
            .collect(),
        rows: Vec::new(),
    }
}

/// The type `format_type()` reports for a declared type clause.
///
/// Only the common spellings are normalized; anything else is lowercased
/// with constraint keywords stripped.
fn catalog_type(sql_type: &str) -> String {
    let upper = sql_type.to_ascii_uppercase();
    let end = [" PRIMARY", " NOT NULL", " NULL", " DEFAULT", " UNIQUE", " REFERENCES", " CHECK"]
        .iter()
        .filter_map(|kw| upper.find(kw))
        .min()
        .unwrap_or(sql_type.len());
    let clause = sql_type[..end].trim().to_ascii_lowercase();
    let keyword = clause
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();

    let normalized = match keyword {
        "serial" | "serial4" | "int" | "int4" | "integer" => "integer",
        "bigserial" | "serial8" | "bigint" | "int8" => "bigint",
        "smallserial" | "serial2" | "smallint" | "int2" => "smallint",
        "float" | "float8" | "double" => "double precision",
        "real" | "float4" => "real",
        "bool" | "boolean" => "boolean",
        "decimal" => return clause.replacen("decimal", "numeric", 1),
        _ => return clause,
    };
    normalized.to_string()
}

/// What PostgreSQL would say when casting `value` to `data_type`, if it refuses.
fn cast_error(data_type: &str, value: &BindValue) -> Option<String> {
    match (data_type, value) {
        ("integer", BindValue::DecimalText(s)) => {
            Some(format!("value \"{}\" is out of range for type integer", s))
        }
        ("integer" | "numeric" | "double precision", BindValue::Text(s)) => {
            Some(format!("invalid input syntax for type {}: \"{}\"", data_type, s))
        }
        _ => None,
    }
}

#[async_trait]
impl TargetWriter for MemoryTarget {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool> {
        Ok(self.tables.contains_key(table))
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<TargetColumn>> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn drop_table(&mut self, table: &str) -> Result<()> {
        self.log.push(format!("DROP {}", table));
        self.tables.remove(table);
        Ok(())
    }

    async fn create_table(&mut self, spec: &TableSpec) -> Result<()> {
        self.log.push(format!("CREATE {}", spec.name));
        if self.fail_create.as_deref() == Some(spec.name.as_str()) {
            return Err(MigrateError::connection("syntax error", "creating table"));
        }
        if self.tables.contains_key(&spec.name) {
            return Err(MigrateError::transfer(&spec.name, "relation already exists"));
        }
        self.tables.insert(spec.name.clone(), table_from_spec(spec));
        Ok(())
    }

    async fn begin(&mut self) -> Result<()> {
        self.log.push("BEGIN".to_string());
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.log.push("COMMIT".to_string());
        if self.fail_commit {
            return Err(MigrateError::connection("commit refused", "committing"));
        }
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.log.push("ROLLBACK".to_string());
        if let Some(snapshot) = self.snapshot.take() {
            self.tables = snapshot;
        }
        Ok(())
    }

    async fn insert_row(
        &mut self,
        table: &str,
        columns: &[TargetColumn],
        values: &[BindValue],
    ) -> Result<InsertOutcome> {
        let attempt = self.inserts_attempted;
        self.inserts_attempted += 1;
        if self.fatal_on_insert == Some(attempt) {
            return Err(MigrateError::connection("connection closed", "inserting row"));
        }

        if let Some((col, bad)) = &self.reject_if {
            let hit = columns
                .iter()
                .zip(values)
                .any(|(c, v)| &c.name == col && v == bad);
            if hit {
                return Ok(InsertOutcome::Rejected(format!(
                    "insert or update on table \"{}\" violates foreign key constraint",
                    table
                )));
            }
        }

        for (col, value) in columns.iter().zip(values) {
            if let Some(reason) = cast_error(&col.data_type, value) {
                return Ok(InsertOutcome::Rejected(reason));
            }
        }

        let row = columns
            .iter()
            .zip(values)
            .map(|(c, v)| (c.name.clone(), v.clone()))
            .collect();
        self.table_mut(table)?.rows.push(row);
        Ok(InsertOutcome::Inserted)
    }

    async fn reset_sequence(&mut self, table: &str, column: &str) -> Result<()> {
        let max = self
            .rows(table)
            .iter()
            .filter_map(|row| match row.get(column) {
                Some(BindValue::Integer(n)) => Some(i64::from(*n)),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        self.sequences
            .insert((table.to_string(), column.to_string()), max);
        Ok(())
    }

    async fn row_count(&mut self, table: &str) -> Result<i64> {
        Ok(self.rows(table).len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_type() {
        assert_eq!(catalog_type("SERIAL PRIMARY KEY"), "integer");
        assert_eq!(catalog_type("FLOAT"), "double precision");
        assert_eq!(catalog_type("NUMERIC"), "numeric");
        assert_eq!(catalog_type("numeric(20,0)"), "numeric(20,0)");
        assert_eq!(catalog_type("DECIMAL(10,2)"), "numeric(10,2)");
        assert_eq!(catalog_type("VARCHAR(20) NOT NULL"), "varchar(20)");
        assert_eq!(catalog_type("INTEGER REFERENCES \"public\".\"leagues\" (id)"), "integer");
        assert_eq!(catalog_type("BYTEA"), "bytea");
    }
}
