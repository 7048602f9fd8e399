//! Row loader with per-row fault isolation.
//!
//! A table is loaded inside one transaction, one insert per row. A row the
//! destination refuses is rolled back on its own and counted; it never takes
//! the rest of the table with it. Only transaction-level failures (lost
//! connection, failed commit) abort the load, and then nothing of the table
//! is kept.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::core::TabularBuffer;
use crate::error::{MigrateError, Result};
use crate::target::{InsertOutcome, TargetColumn, TargetWriter};
use crate::typemap::adapt;

/// Transfer engine configuration.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Rejected rows kept per table for diagnostics.
    pub max_rejection_samples: usize,
    /// Log progress every this many rows (0 disables).
    pub progress_interval: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_rejection_samples: 5,
            progress_interval: 10_000,
        }
    }
}

/// A row the destination refused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRejection {
    /// Zero-based position of the row in the extracted table.
    pub row: usize,
    /// Database error message.
    pub reason: String,
}

/// Per-table load statistics.
///
/// `rows_inserted + rows_rejected == rows_attempted` always holds, and
/// `rejections` keeps at most the first few rejected rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadOutcome {
    /// Destination table name.
    pub table: String,
    /// Columns written, in the extract's order.
    pub columns: Vec<String>,
    /// Extracted columns with no counterpart in the destination.
    pub dropped_columns: Vec<String>,
    pub rows_attempted: u64,
    pub rows_inserted: u64,
    pub rows_rejected: u64,
    /// First rejected rows with their reasons.
    pub rejections: Vec<RowRejection>,
    #[serde(skip)]
    max_samples: usize,
}

impl LoadOutcome {
    pub fn new(table: impl Into<String>, max_samples: usize) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            dropped_columns: Vec::new(),
            rows_attempted: 0,
            rows_inserted: 0,
            rows_rejected: 0,
            rejections: Vec::new(),
            max_samples,
        }
    }

    pub fn record_inserted(&mut self) {
        self.rows_attempted += 1;
        self.rows_inserted += 1;
    }

    /// Count a rejection. Returns whether it was kept as a sample.
    pub fn record_rejected(&mut self, row: usize, reason: String) -> bool {
        self.rows_attempted += 1;
        self.rows_rejected += 1;
        if self.rejections.len() < self.max_samples {
            self.rejections.push(RowRejection { row, reason });
            true
        } else {
            false
        }
    }

    /// Whether every attempted row is accounted for.
    pub fn is_balanced(&self) -> bool {
        self.rows_inserted + self.rows_rejected == self.rows_attempted
    }
}

/// How extracted columns map onto destination columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnPlan {
    /// Buffer column index paired with the destination column it feeds.
    pub selected: Vec<(usize, TargetColumn)>,
    /// Buffer columns with no destination column of the same name.
    pub dropped: Vec<String>,
}

impl ColumnPlan {
    pub fn target_columns(&self) -> Vec<TargetColumn> {
        self.selected.iter().map(|(_, col)| col.clone()).collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.selected.iter().map(|(_, col)| col.name.clone()).collect()
    }
}

/// Match extracted columns to destination columns by exact name.
///
/// Keeps the extract's column order. Destination columns the extract lacks
/// are left out, so they take their defaults.
pub fn reconcile_columns(buffer_columns: &[&str], target_columns: &[TargetColumn]) -> ColumnPlan {
    let mut selected = Vec::new();
    let mut dropped = Vec::new();

    for (idx, name) in buffer_columns.iter().enumerate() {
        match target_columns.iter().find(|c| c.name == *name) {
            Some(col) => selected.push((idx, col.clone())),
            None => dropped.push(name.to_string()),
        }
    }

    ColumnPlan { selected, dropped }
}

/// Transfer engine for loading extracted tables into the destination.
pub struct TransferEngine {
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    /// Load every row of `buffer` into `table`.
    ///
    /// Refused rows are counted in the returned outcome. An `Err` means the
    /// table's transaction was rolled back and nothing was kept.
    pub async fn load_table(
        &self,
        target: &mut dyn TargetWriter,
        table: &str,
        buffer: &TabularBuffer,
    ) -> Result<LoadOutcome> {
        let start = Instant::now();

        let target_columns = target.table_columns(table).await?;
        let plan = reconcile_columns(&buffer.column_names(), &target_columns);
        if plan.selected.is_empty() {
            return Err(MigrateError::NoMatchingColumns(table.to_string()));
        }
        if !plan.dropped.is_empty() {
            info!(
                "{}: dropping {} extracted columns with no destination column: {}",
                table,
                plan.dropped.len(),
                plan.dropped.join(", ")
            );
        }

        let mut outcome = LoadOutcome::new(table, self.config.max_rejection_samples);
        outcome.columns = plan.column_names();
        outcome.dropped_columns = plan.dropped.clone();

        target.begin().await?;

        if let Err(e) = self.insert_rows(target, table, buffer, &plan, &mut outcome).await {
            error!("{}: load aborted, rolling back: {}", table, e);
            if let Err(rollback_err) = target.rollback().await {
                error!("{}: rollback failed: {}", table, rollback_err);
            }
            return Err(e);
        }

        if let Err(e) = target.commit().await {
            error!("{}: commit failed, rolling back: {}", table, e);
            if let Err(rollback_err) = target.rollback().await {
                error!("{}: rollback failed: {}", table, rollback_err);
            }
            return Err(MigrateError::transfer(table, format!("commit failed: {}", e)));
        }

        let elapsed = start.elapsed();
        info!(
            "{}: {} of {} rows inserted, {} rejected in {:.1}s",
            table,
            outcome.rows_inserted,
            outcome.rows_attempted,
            outcome.rows_rejected,
            elapsed.as_secs_f64()
        );

        Ok(outcome)
    }

    async fn insert_rows(
        &self,
        target: &mut dyn TargetWriter,
        table: &str,
        buffer: &TabularBuffer,
        plan: &ColumnPlan,
        outcome: &mut LoadOutcome,
    ) -> Result<()> {
        let columns = plan.target_columns();
        let total = buffer.num_rows();

        for row in 0..total {
            let values: Vec<_> = plan
                .selected
                .iter()
                .map(|(idx, _)| adapt(buffer.value(row, *idx)))
                .collect();

            match target.insert_row(table, &columns, &values).await? {
                InsertOutcome::Inserted => outcome.record_inserted(),
                InsertOutcome::Rejected(reason) => {
                    let message = format!("{}: row {} rejected: {}", table, row, reason);
                    if outcome.record_rejected(row, reason) {
                        warn!("{}", message);
                    } else {
                        debug!("{}", message);
                    }
                }
            }

            let done = row + 1;
            if self.config.progress_interval > 0 && done % self.config.progress_interval == 0 {
                info!("{}: {}/{} rows processed", table, done, total);
            }
        }

        Ok(())
    }
}
