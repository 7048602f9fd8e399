//! sqlite-pg-migrate CLI - full-refresh SQLite to PostgreSQL migration.

use clap::{Parser, Subcommand};
use sqlite_pg_migrate::{
    Config, HealthCheckResult, MigrateError, MigrationResult, Orchestrator, TargetMode,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "sqlite-pg-migrate")]
#[command(about = "Full-refresh SQLite to PostgreSQL migration")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration
    Run {
        /// Drop destination tables that already exist instead of failing
        #[arg(long)]
        drop_existing: bool,

        /// Dry run: extract the source and show the plan without touching the target
        #[arg(long)]
        dry_run: bool,

        /// Override target schema
        #[arg(long)]
        target_schema: Option<String>,
    },

    /// Validate row counts between source and target
    Validate,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            drop_existing,
            dry_run,
            target_schema,
        } => {
            // Apply overrides
            if let Some(schema) = target_schema {
                config.target.schema = schema;
            }
            config.validate()?;

            let mut orchestrator = Orchestrator::new(config);
            if drop_existing {
                orchestrator = orchestrator.with_target_mode(TargetMode::DropRecreate);
            }

            if dry_run {
                let report = orchestrator.dry_run().await?;
                if cli.output_json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    println!("\nDry run completed!");
                    for table in &report {
                        println!(
                            "  {} <- {}: {} rows, {} columns",
                            table.table,
                            table.source_table,
                            table.rows,
                            table.columns.len()
                        );
                        if !table.dropped_columns.is_empty() {
                            println!("    Dropped: {}", table.dropped_columns.join(", "));
                        }
                        if !table.missing_columns.is_empty() {
                            println!("    Not in source: {}", table.missing_columns.join(", "));
                        }
                    }
                }
                return Ok(());
            }

            let result = orchestrator.run().await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result);
            }
        }

        Commands::Validate => {
            let orchestrator = Orchestrator::new(config);
            let checks = orchestrator.validate().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&checks)?);
            } else {
                for check in &checks {
                    println!("  {}: {} rows", check.table, check.source_rows);
                }
                println!("Validation completed successfully");
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config);
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_health(&result);
            }

            if !result.healthy {
                return Err(MigrateError::connection(
                    "health check failed",
                    "testing source and target connections",
                ));
            }
        }
    }

    Ok(())
}

fn print_summary(result: &MigrationResult) {
    println!("\nMigration completed!");
    println!("  Run ID: {}", result.run_id);
    println!("  Status: {}", result.status);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Rows: {} inserted, {} rejected of {}",
        result.rows_inserted, result.rows_rejected, result.rows_attempted
    );
    for table in &result.tables {
        println!(
            "  {}: {} inserted, {} rejected",
            table.table, table.rows_inserted, table.rows_rejected
        );
        for rejection in &table.rejections {
            println!("    row {}: {}", rejection.row, rejection.reason);
        }
    }
}

fn print_health(result: &HealthCheckResult) {
    let status = |ok: bool| if ok { "ok" } else { "unreachable" };
    println!("Connections:");
    println!(
        "  sqlite source:     {} in {}ms",
        status(result.source_connected),
        result.source_latency_ms
    );
    if let Some(err) = &result.source_error {
        println!("    {}", err);
    }
    println!(
        "  postgres target:   {} in {}ms",
        status(result.target_connected),
        result.target_latency_ms
    );
    if let Some(err) = &result.target_error {
        println!("    {}", err);
    }
    println!("{}", if result.healthy { "HEALTHY" } else { "UNHEALTHY" });
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json leaves stdout parseable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Invalid log format '{}'. Valid values: text, json", other)),
    }

    Ok(())
}
