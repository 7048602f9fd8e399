//! SQLite source extraction.
//!
//! Reads whole tables into [`TabularBuffer`]s through an SQLx pool. Reads are
//! unfiltered and unpaged. Every failure here is fatal for the run.

use std::path::PathBuf;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::identifier::quote_ident;
use crate::core::schema::TableSpec;
use crate::core::{CellValue, TabularBuffer};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only SQLite source.
pub struct SqliteSource {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteSource {
    /// Open the SQLite file named in the configuration.
    ///
    /// The file must already exist; it is opened read-only.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let context = format!("opening SQLite source {}", config.path.display());

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::connection(e, context.as_str()))?;

        // Test connection
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::connection(e, context.as_str()))?;

        info!("Opened SQLite source: {}", config.path.display());

        Ok(Self {
            pool,
            path: config.path.clone(),
        })
    }

    /// Path of the source database file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Column names of a table, in declaration order.
    pub async fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let pragma = format!("PRAGMA table_info({})", quote_ident(table));
        let rows: Vec<SqliteRow> = sqlx::query(&pragma).fetch_all(&self.pool).await?;

        let columns = rows
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(MigrateError::SourceTableMissing(table.to_string()));
        }

        Ok(columns)
    }

    /// Read every row and every column of a table.
    pub async fn extract_table(&self, table: &str) -> Result<TabularBuffer> {
        let columns = self.column_names(table).await?;

        let col_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let query = format!(
            "SELECT {} FROM {}",
            col_list.join(", "),
            quote_ident(table)
        );
        debug!("{}", query);

        let rows: Vec<SqliteRow> = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut buffer = TabularBuffer::new(table, columns);
        buffer.reserve(rows.len());
        for row in &rows {
            buffer.push_row(read_row(row)?)?;
        }

        info!(
            "Extracted {} rows x {} columns from {}",
            buffer.num_rows(),
            buffer.num_columns(),
            table
        );

        Ok(buffer)
    }

    /// Extract the source table of every spec, in spec order.
    pub async fn extract_all(&self, specs: &[TableSpec]) -> Result<Vec<TabularBuffer>> {
        let mut buffers = Vec::with_capacity(specs.len());
        for spec in specs {
            buffers.push(self.extract_table(&spec.source_table).await?);
        }
        Ok(buffers)
    }

    /// Get the row count for a table.
    pub async fn row_count(&self, table: &str) -> Result<i64> {
        // Resolve the table first so a missing table reports as such
        self.column_names(table).await?;

        let query = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let row = sqlx::query(&query).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn read_row(row: &SqliteRow) -> Result<Vec<CellValue>> {
    (0..row.len()).map(|idx| read_cell(row, idx)).collect()
}

/// Decode one cell by its runtime storage class.
///
/// SQLite columns are loosely typed, so the declared column type says
/// nothing reliable about an individual value.
fn read_cell(row: &SqliteRow, idx: usize) -> Result<CellValue> {
    let storage_class = {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(CellValue::Null);
        }
        raw.type_info().name().to_string()
    };

    let value = match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => CellValue::Integer(row.try_get_unchecked::<i64, _>(idx)?),
        "REAL" | "NUMERIC" => CellValue::Real(row.try_get_unchecked::<f64, _>(idx)?),
        "BLOB" => CellValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        _ => CellValue::Text(row.try_get_unchecked::<String, _>(idx)?),
    };

    Ok(value)
}
