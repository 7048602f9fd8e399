//! Migration orchestrator - main workflow coordinator.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, TargetMode};
use crate::core::schema::TableSpec;
use crate::error::{MigrateError, Result};
use crate::provision::provision;
use crate::source::SqliteSource;
use crate::target::{PgTarget, TargetWriter};
use crate::transfer::{LoadOutcome, TransferConfig, TransferEngine};

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    tables: Vec<TableSpec>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// `completed`, or `completed_with_rejections` when any row was refused.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total tables processed.
    pub tables_total: usize,

    pub rows_attempted: u64,
    pub rows_inserted: u64,
    pub rows_rejected: u64,

    /// Per-table outcomes, in load order.
    pub tables: Vec<LoadOutcome>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity of both databases.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
}

/// Source and destination row counts of one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowCountCheck {
    pub table: String,
    pub source_rows: i64,
    pub target_rows: i64,
}

impl RowCountCheck {
    pub fn matches(&self) -> bool {
        self.source_rows == self.target_rows
    }
}

/// What a run would do with one table, computed without the destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunTable {
    pub table: String,
    pub source_table: String,
    pub rows: usize,
    /// Extracted columns the declaration keeps.
    pub columns: Vec<String>,
    /// Extracted columns the declaration does not have.
    pub dropped_columns: Vec<String>,
    /// Declared columns the extract does not provide.
    pub missing_columns: Vec<String>,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(config: Config) -> Self {
        let tables = config.migration.table_specs();
        Self { config, tables }
    }

    /// Table declarations, in load order.
    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    /// Run the migration against the configured PostgreSQL target.
    ///
    /// The target connection is opened first; if that fails nothing else is
    /// touched. It is closed again whether the run succeeds or not.
    pub async fn run(&self) -> Result<MigrationResult> {
        let mut target = PgTarget::connect(&self.config.target).await?;
        let result = self.run_with(&mut target).await;
        target.close().await;
        result
    }

    /// Run the migration against an already open target.
    pub async fn run_with(&self, target: &mut dyn TargetWriter) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!("Starting migration run: {}", run_id);

        // Every source table is read before any DDL, so a missing file or
        // table leaves the destination untouched and a retry can succeed.
        info!("Phase 1: Extracting {} source tables", self.tables.len());
        let source = SqliteSource::connect(&self.config.source).await?;
        let buffers = source.extract_all(&self.tables).await;
        source.close().await;
        let buffers = buffers?;

        info!("Phase 2: Provisioning {} tables", self.tables.len());
        provision(target, &self.tables, self.config.migration.target_mode).await?;

        info!("Phase 3: Loading tables");
        let engine = TransferEngine::new(TransferConfig {
            max_rejection_samples: self.config.migration.max_rejection_samples,
            progress_interval: self.config.migration.progress_interval,
        });

        let mut outcomes = Vec::with_capacity(self.tables.len());
        for (spec, buffer) in self.tables.iter().zip(&buffers) {
            let outcome = engine.load_table(target, &spec.name, buffer).await?;
            reset_sequences(target, spec).await;
            outcomes.push(outcome);
        }

        let completed_at = Utc::now();
        let rows_attempted = outcomes.iter().map(|o| o.rows_attempted).sum();
        let rows_inserted = outcomes.iter().map(|o| o.rows_inserted).sum();
        let rows_rejected: u64 = outcomes.iter().map(|o| o.rows_rejected).sum();
        let status = if rows_rejected == 0 {
            "completed"
        } else {
            "completed_with_rejections"
        };

        let result = MigrationResult {
            run_id,
            status: status.to_string(),
            duration_seconds: timer.elapsed().as_secs_f64(),
            started_at,
            completed_at,
            tables_total: outcomes.len(),
            rows_attempted,
            rows_inserted,
            rows_rejected,
            tables: outcomes,
        };

        info!(
            "Migration {}: {} rows inserted, {} rejected across {} tables in {:.1}s",
            result.status,
            result.rows_inserted,
            result.rows_rejected,
            result.tables_total,
            result.duration_seconds
        );

        Ok(result)
    }

    /// Extract the source and report what a run would write, without
    /// connecting to the destination.
    pub async fn dry_run(&self) -> Result<Vec<DryRunTable>> {
        let source = SqliteSource::connect(&self.config.source).await?;
        let buffers = source.extract_all(&self.tables).await;
        source.close().await;
        let buffers = buffers?;

        let report = self
            .tables
            .iter()
            .zip(&buffers)
            .map(|(spec, buffer)| {
                let extracted = buffer.column_names();
                let declared = spec.column_names();
                let (columns, dropped): (Vec<&str>, Vec<&str>) =
                    extracted.iter().copied().partition(|c| declared.contains(c));
                let missing = declared
                    .iter()
                    .filter(|c| !extracted.contains(*c))
                    .map(|c| c.to_string())
                    .collect();

                info!(
                    "{} <- {}: {} rows, {} columns kept, {} dropped",
                    spec.name,
                    spec.source_table,
                    buffer.num_rows(),
                    columns.len(),
                    dropped.len()
                );

                DryRunTable {
                    table: spec.name.clone(),
                    source_table: spec.source_table.clone(),
                    rows: buffer.num_rows(),
                    columns: columns.into_iter().map(String::from).collect(),
                    dropped_columns: dropped.into_iter().map(String::from).collect(),
                    missing_columns: missing,
                }
            })
            .collect();

        Ok(report)
    }

    /// Validate row counts between source and target.
    pub async fn validate(&self) -> Result<Vec<RowCountCheck>> {
        let mut target = PgTarget::connect(&self.config.target).await?;
        let result = self.validate_with(&mut target).await;
        target.close().await;
        result
    }

    /// Compare row counts against an already open target.
    ///
    /// Fails with [`MigrateError::Validation`] when any table differs.
    pub async fn validate_with(&self, target: &mut dyn TargetWriter) -> Result<Vec<RowCountCheck>> {
        let source = SqliteSource::connect(&self.config.source).await?;
        let mut checks = Vec::with_capacity(self.tables.len());

        for spec in &self.tables {
            let source_rows = match source.row_count(&spec.source_table).await {
                Ok(n) => n,
                Err(e) => {
                    source.close().await;
                    return Err(e);
                }
            };
            let target_rows = if target.table_exists(&spec.name).await? {
                target.row_count(&spec.name).await?
            } else {
                0
            };

            let check = RowCountCheck {
                table: spec.name.clone(),
                source_rows,
                target_rows,
            };
            if check.matches() {
                info!("{}: {} rows (match)", spec.name, source_rows);
            } else {
                warn!(
                    "{}: source={} target={} (MISMATCH)",
                    spec.name, source_rows, target_rows
                );
            }
            checks.push(check);
        }
        source.close().await;

        let mismatched: Vec<String> = checks
            .iter()
            .filter(|c| !c.matches())
            .map(|c| format!("{} (source={} target={})", c.table, c.source_rows, c.target_rows))
            .collect();
        if !mismatched.is_empty() {
            return Err(MigrateError::Validation(format!(
                "row counts differ for {}",
                mismatched.join(", ")
            )));
        }

        Ok(checks)
    }

    /// Test both connections.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let (source_connected, source_error) =
            match SqliteSource::connect(&self.config.source).await {
                Ok(source) => {
                    source.close().await;
                    (true, None)
                }
                Err(e) => (false, Some(e.to_string())),
            };
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let (target_connected, target_error) = match PgTarget::connect(&self.config.target).await {
            Ok(target) => {
                target.close().await;
                (true, None)
            }
            Err(e) => (false, Some(e.to_string())),
        };
        let target_latency_ms = start.elapsed().as_millis() as u64;

        Ok(HealthCheckResult {
            healthy: source_connected && target_connected,
            source_connected,
            source_latency_ms,
            source_error,
            target_connected,
            target_latency_ms,
            target_error,
        })
    }

    /// Override the configured target mode.
    pub fn with_target_mode(mut self, mode: TargetMode) -> Self {
        self.config.migration.target_mode = mode;
        self
    }
}

/// Advance the sequences behind a table's serial columns past the copied ids.
async fn reset_sequences(target: &mut dyn TargetWriter, spec: &TableSpec) {
    for col in spec.serial_columns() {
        match target.reset_sequence(&spec.name, &col.name).await {
            Ok(()) => debug!("Reset sequence for {}.{}", spec.name, col.name),
            Err(e) => warn!(
                "Failed to reset sequence for {}.{}: {}",
                spec.name, col.name, e
            ),
        }
    }
}
