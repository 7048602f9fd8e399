//! # sqlite-pg-migrate
//!
//! Full-refresh SQLite to PostgreSQL table migration.
//!
//! Each run:
//!
//! - **Provisions** the destination tables from static declarations, with
//!   `NUMERIC` identifier columns so oversized ids cannot overflow
//! - **Extracts** whole source tables into memory
//! - **Loads** them row by row, isolating and counting rows the destination
//!   refuses instead of aborting the table
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_pg_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> sqlite_pg_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let result = Orchestrator::new(config).run().await?;
//!     println!(
//!         "Inserted {} rows, rejected {}",
//!         result.rows_inserted, result.rows_rejected
//!     );
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod provision;
pub mod source;
pub mod target;
pub mod transfer;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig, TargetMode};
pub use crate::core::{BindValue, CellValue, ColumnSpec, TableSpec, TabularBuffer};
pub use error::{MigrateError, Result};
pub use orchestrator::{DryRunTable, HealthCheckResult, MigrationResult, Orchestrator, RowCountCheck};
pub use source::SqliteSource;
pub use target::{InsertOutcome, PgTarget, TargetColumn, TargetWriter};
pub use transfer::{LoadOutcome, RowRejection, TransferConfig, TransferEngine};
