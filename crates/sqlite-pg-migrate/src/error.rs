//! Error types for the migration library.

use thiserror::Error;

/// Process exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Process exit code when a database connection cannot be opened.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Process exit code for source extraction errors.
pub const EXIT_SOURCE_ERROR: u8 = 3;
/// Process exit code for target write errors.
pub const EXIT_TARGET_ERROR: u8 = 4;
/// Process exit code for schema creation errors.
pub const EXIT_PROVISION_ERROR: u8 = 5;
/// Process exit code for row count validation failures.
pub const EXIT_VALIDATION_ERROR: u8 = 6;
/// Process exit code for file IO errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
///
/// Every variant is fatal for the run. Row-level insert failures are not
/// errors; they are counted in a [`LoadOutcome`](crate::transfer::LoadOutcome).
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// A connection could not be opened (or timed out)
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// A source table named by a table spec is not in the source database
    #[error("Source table {0} does not exist")]
    SourceTableMissing(String),

    /// A target table already exists and the target mode does not allow replacing it
    #[error(
        "Target table {0} already exists - drop it or rerun with --drop-existing \
         (target_mode: drop_recreate)"
    )]
    TableExists(String),

    /// DDL for a target table failed
    #[error("Schema creation failed for table {table}: {message}")]
    Provision { table: String, message: String },

    /// No extracted column matches a column of the target table
    #[error("No matching columns between source data and target table {0}")]
    NoMatchingColumns(String),

    /// Table load failed at the transaction level
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// Row count validation failed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Provision error
    pub fn provision(table: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::Provision {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Connection { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::Source(_) | MigrateError::SourceTableMissing(_) => EXIT_SOURCE_ERROR,
            MigrateError::Target(_)
            | MigrateError::NoMatchingColumns(_)
            | MigrateError::Transfer { .. } => EXIT_TARGET_ERROR,
            MigrateError::TableExists(_) | MigrateError::Provision { .. } => EXIT_PROVISION_ERROR,
            MigrateError::Validation(_) => EXIT_VALIDATION_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
