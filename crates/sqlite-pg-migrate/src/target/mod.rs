//! PostgreSQL target database operations.

#[cfg(test)]
pub(crate) mod memory;
mod tls;

pub use tls::SslMode;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_postgres::{types::ToSql, Client, Config as PgConfig, NoTls, Statement};
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::identifier::{qualify, quote_ident};
use crate::core::schema::TableSpec;
use crate::core::value::BindValue;
use crate::error::{MigrateError, Result};

/// Savepoint wrapped around every row insert.
const ROW_SAVEPOINT: &str = "migrate_row";

/// A destination column as the catalog reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetColumn {
    /// Column name.
    pub name: String,

    /// Type as rendered by `format_type()` (e.g. `numeric`, `double precision`).
    pub data_type: String,
}

impl TargetColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Result of inserting a single row.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The row is in the table.
    Inserted,

    /// The database refused the row; the reason is its error message.
    /// The surrounding transaction is still usable.
    Rejected(String),
}

/// Operations the migration needs from the destination database.
///
/// All table names are unqualified; implementations resolve them in
/// [`schema`](TargetWriter::schema). Any `Err` returned here is fatal for the
/// run. A row the database refuses is reported as
/// [`InsertOutcome::Rejected`], not as an error.
#[async_trait]
pub trait TargetWriter: Send {
    /// Schema the tables live in.
    fn schema(&self) -> &str;

    /// Check if a table exists.
    async fn table_exists(&mut self, table: &str) -> Result<bool>;

    /// Column names and types of an existing table, in attribute order.
    async fn table_columns(&mut self, table: &str) -> Result<Vec<TargetColumn>>;

    /// Drop a table if it exists.
    async fn drop_table(&mut self, table: &str) -> Result<()>;

    /// Create a table from its declaration.
    async fn create_table(&mut self, spec: &TableSpec) -> Result<()>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Insert one row inside the open transaction.
    ///
    /// A refused row leaves the transaction as it was before the call.
    async fn insert_row(
        &mut self,
        table: &str,
        columns: &[TargetColumn],
        values: &[BindValue],
    ) -> Result<InsertOutcome>;

    /// Advance the sequence behind `column` past the largest stored value.
    async fn reset_sequence(&mut self, table: &str, column: &str) -> Result<()>;

    /// Get the row count for a table.
    async fn row_count(&mut self, table: &str) -> Result<i64>;
}

/// Single-connection PostgreSQL target.
pub struct PgTarget {
    client: Client,
    connection: JoinHandle<()>,
    schema: String,
    statements: HashMap<String, Statement>,
}

impl PgTarget {
    /// Connect to the target database.
    ///
    /// Fails with [`MigrateError::Connection`] when the server cannot be
    /// reached or authentication fails within the configured timeout.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let context = format!("connecting to PostgreSQL target {}", config.display_name());

        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.application_name("sqlite-pg-migrate");

        // Connection options for reliability
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(config.connect_timeout());

        let deadline = config.connect_timeout();
        let tls = SslMode::parse(&config.ssl_mode)?.connector();

        let (client, connection) = match tls {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let (client, conn) = tokio::time::timeout(deadline, pg_config.connect(NoTls))
                    .await
                    .map_err(|_| MigrateError::connection("timed out", &context))?
                    .map_err(|e| MigrateError::connection(e, &context))?;
                let handle = tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        warn!("PostgreSQL target connection error: {}", e);
                    }
                });
                (client, handle)
            }
            Some(tls) => {
                let (client, conn) = tokio::time::timeout(deadline, pg_config.connect(tls))
                    .await
                    .map_err(|_| MigrateError::connection("timed out", &context))?
                    .map_err(|e| MigrateError::connection(e, &context))?;
                let handle = tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        warn!("PostgreSQL target connection error: {}", e);
                    }
                });
                (client, handle)
            }
        };

        // Test connection
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection(e, &context))?;

        info!("Connected to PostgreSQL target: {}", config.display_name());

        Ok(Self {
            client,
            connection,
            schema: config.schema.clone(),
            statements: HashMap::new(),
        })
    }

    /// Close the connection and wait for it to shut down.
    pub async fn close(self) {
        drop(self.statements);
        drop(self.client);
        if let Err(e) = self.connection.await {
            warn!("PostgreSQL target connection task failed: {}", e);
        }
        debug!("Closed PostgreSQL target connection");
    }

    async fn prepare_insert(
        &mut self,
        sql: &str,
    ) -> std::result::Result<Statement, tokio_postgres::Error> {
        if let Some(stmt) = self.statements.get(sql) {
            return Ok(stmt.clone());
        }
        let stmt = self.client.prepare(sql).await?;
        self.statements.insert(sql.to_string(), stmt.clone());
        Ok(stmt)
    }
}

#[async_trait]
impl TargetWriter for PgTarget {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM pg_catalog.pg_tables
                    WHERE schemaname = $1 AND tablename = $2
                )",
                &[&self.schema, &table],
            )
            .await?;

        Ok(row.get(0))
    }

    async fn table_columns(&mut self, table: &str) -> Result<Vec<TargetColumn>> {
        let rows = self
            .client
            .query(
                "SELECT a.attname, format_type(a.atttypid, a.atttypmod)
                 FROM pg_catalog.pg_attribute a
                 JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
                 JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
                 WHERE n.nspname = $1 AND c.relname = $2
                   AND a.attnum > 0 AND NOT a.attisdropped
                 ORDER BY a.attnum",
                &[&self.schema, &table],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| TargetColumn::new(row.get::<_, String>(0), row.get::<_, String>(1)))
            .collect())
    }

    async fn drop_table(&mut self, table: &str) -> Result<()> {
        let sql = format!("DROP TABLE IF EXISTS {} CASCADE", qualify(&self.schema, table));
        self.client.batch_execute(&sql).await?;
        self.statements.clear();

        debug!("Dropped table {}.{}", self.schema, table);
        Ok(())
    }

    async fn create_table(&mut self, spec: &TableSpec) -> Result<()> {
        let ddl = generate_ddl(spec, &self.schema);
        self.client.batch_execute(&ddl).await?;

        debug!("Created table {}.{}", self.schema, spec.name);
        Ok(())
    }

    async fn begin(&mut self) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn insert_row(
        &mut self,
        table: &str,
        columns: &[TargetColumn],
        values: &[BindValue],
    ) -> Result<InsertOutcome> {
        let sql = build_insert_sql(&self.schema, table, columns);
        let params: Vec<Box<dyn ToSql + Sync + Send>> = columns
            .iter()
            .zip(values)
            .map(|(col, value)| bind_param(WireType::for_column(&col.data_type), value))
            .collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        self.client
            .batch_execute(&format!("SAVEPOINT {}", ROW_SAVEPOINT))
            .await?;

        let result = match self.prepare_insert(&sql).await {
            Ok(stmt) => self.client.execute(&stmt, &param_refs).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => {
                self.client
                    .batch_execute(&format!("RELEASE SAVEPOINT {}", ROW_SAVEPOINT))
                    .await?;
                Ok(InsertOutcome::Inserted)
            }
            Err(e) if e.is_closed() => Err(MigrateError::Target(e)),
            Err(e) => {
                self.client
                    .batch_execute(&format!("ROLLBACK TO SAVEPOINT {}", ROW_SAVEPOINT))
                    .await?;
                Ok(InsertOutcome::Rejected(rejection_reason(&e)))
            }
        }
    }

    async fn reset_sequence(&mut self, table: &str, column: &str) -> Result<()> {
        let qualified = qualify(&self.schema, table);
        let row = self
            .client
            .query_one(
                "SELECT pg_get_serial_sequence($1, $2)",
                &[&qualified, &column],
            )
            .await?;
        let sequence: Option<String> = row.get(0);
        let Some(sequence) = sequence else {
            debug!("No sequence behind {}.{}", qualified, column);
            return Ok(());
        };

        // An empty table leaves the sequence so that nextval() returns 1
        let col = quote_ident(column);
        let sql = format!(
            "SELECT setval($1::text::regclass, COALESCE(MAX({col})::bigint, 1), MAX({col}) IS NOT NULL) \
             FROM {qualified}"
        );
        self.client.query_one(sql.as_str(), &[&sequence]).await?;

        debug!("Reset sequence {} for {}.{}", sequence, qualified, column);
        Ok(())
    }

    async fn row_count(&mut self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", qualify(&self.schema, table));
        let row = self.client.query_one(sql.as_str(), &[]).await?;
        Ok(row.get(0))
    }
}

/// Generate DDL for table creation.
pub fn generate_ddl(spec: &TableSpec, schema: &str) -> String {
    let columns: Vec<String> = spec
        .columns
        .iter()
        .map(|col| format!("    {} {}", quote_ident(&col.name), col.sql_type))
        .collect();

    format!(
        "CREATE TABLE {} (\n{}\n)",
        qualify(schema, &spec.name),
        columns.join(",\n")
    )
}

/// How a parameter travels to the server before being cast to its column.
///
/// Chosen from the column alone, so every row of a table shares one
/// prepared statement whatever its NULLs and value widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Text,
    Bytea,
}

impl WireType {
    pub fn for_column(data_type: &str) -> Self {
        if data_type == "bytea" {
            WireType::Bytea
        } else {
            WireType::Text
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WireType::Text => "text",
            WireType::Bytea => "bytea",
        }
    }
}

/// Build a single-row INSERT.
///
/// Parameters are sent as text (bytea for bytea columns) and cast to the
/// column's own type on the server. Text input parses exactly, so wide
/// integers and floats land in `numeric` columns without rounding.
pub fn build_insert_sql(schema: &str, table: &str, columns: &[TargetColumn]) -> String {
    let col_list: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();

    let placeholders: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| placeholder(i + 1, &col.data_type))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualify(schema, table),
        col_list.join(", "),
        placeholders.join(", ")
    )
}

/// Parameter `$n` cast to `data_type`.
///
/// Integer columns go through `numeric` first so a fractional float rounds
/// the way an assignment would instead of failing integer text input.
fn placeholder(n: usize, data_type: &str) -> String {
    let wire = WireType::for_column(data_type).name();
    match data_type {
        "smallint" | "integer" | "bigint" => {
            format!("CAST(CAST(${}::{} AS numeric) AS {})", n, wire, data_type)
        }
        _ => format!("CAST(${}::{} AS {})", n, wire, data_type),
    }
}

/// Convert a BindValue to a boxed ToSql parameter of the column's wire type.
fn bind_param(wire: WireType, value: &BindValue) -> Box<dyn ToSql + Sync + Send> {
    match wire {
        WireType::Text => Box::new(text_param(value)),
        WireType::Bytea => Box::new(match value {
            BindValue::Null => None,
            BindValue::Bytes(b) => Some(b.clone()),
            other => text_param(other).map(String::into_bytes),
        }),
    }
}

/// Text form of a value, as PostgreSQL's input functions accept it.
pub fn text_param(value: &BindValue) -> Option<String> {
    match value {
        BindValue::Null => None,
        BindValue::Integer(n) => Some(n.to_string()),
        BindValue::Float(f) => Some(float_text(*f)),
        BindValue::DecimalText(s) | BindValue::Text(s) => Some(s.clone()),
        BindValue::Bytes(b) => Some(format!("\\x{}", hex::encode(b))),
    }
}

/// Shortest decimal that parses back to the same `f64`.
fn float_text(f: f64) -> String {
    if f == f64::INFINITY {
        "Infinity".to_string()
    } else if f == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        f.to_string()
    }
}

fn rejection_reason(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => match db.detail() {
            Some(detail) => format!("{}: {}", db.message(), detail),
            None => db.message().to_string(),
        },
        None => e.to_string(),
    }
}
