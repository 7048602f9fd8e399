//! Configuration validation.

use std::collections::HashSet;

use super::Config;
use crate::core::identifier::{validate_column_type, validate_identifier};
use crate::core::schema::TableSpec;
use crate::error::{MigrateError, Result};
use crate::target::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.r#type != "sqlite" {
        return Err(MigrateError::Config(format!(
            "source.type must be 'sqlite', got '{}'",
            config.source.r#type
        )));
    }
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }

    // Target validation
    if config.target.r#type != "postgres" {
        return Err(MigrateError::Config(format!(
            "target.type must be 'postgres', got '{}'",
            config.target.r#type
        )));
    }
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    validate_identifier(&config.target.schema)
        .map_err(|e| MigrateError::Config(format!("target.schema: {}", e)))?;
    SslMode::parse(&config.target.ssl_mode)?;
    if config.target.connect_timeout_secs == 0 {
        return Err(MigrateError::Config(
            "target.connect_timeout_secs must be at least 1".into(),
        ));
    }

    // Table declarations
    let mut table_names = HashSet::new();
    for spec in &config.migration.tables {
        validate_table_spec(spec)?;
        if !table_names.insert(spec.name.as_str()) {
            return Err(MigrateError::Config(format!(
                "migration.tables declares '{}' more than once",
                spec.name
            )));
        }
    }

    Ok(())
}

fn validate_table_spec(spec: &TableSpec) -> Result<()> {
    let context = |e: MigrateError| MigrateError::Config(format!("table '{}': {}", spec.name, e));

    validate_identifier(&spec.name).map_err(context)?;
    validate_identifier(&spec.source_table).map_err(context)?;

    if spec.columns.is_empty() {
        return Err(MigrateError::Config(format!(
            "table '{}' declares no columns",
            spec.name
        )));
    }

    let mut column_names = HashSet::new();
    for col in &spec.columns {
        validate_identifier(&col.name).map_err(context)?;
        validate_column_type(&col.sql_type).map_err(context)?;
        if !column_names.insert(col.name.as_str()) {
            return Err(MigrateError::Config(format!(
                "table '{}' declares column '{}' more than once",
                spec.name, col.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig, TargetConfig};

    fn valid_config() -> Config {
        Config {
            source: SourceConfig::new("database.sqlite"),
            target: TargetConfig {
                r#type: "postgres".to_string(),
                host: "localhost".to_string(),
                port: 5432,
                database: "soccer".to_string(),
                user: "postgres".to_string(),
                password: "password".to_string(),
                schema: "public".to_string(),
                ssl_mode: "disable".to_string(),
                connect_timeout_secs: 10,
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_source_path() {
        let mut config = valid_config();
        config.source.path = "".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wrong_source_type() {
        let mut config = valid_config();
        config.source.r#type = "mssql".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wrong_target_type() {
        let mut config = valid_config();
        config.target.r#type = "mysql".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_fields() {
        for field in ["host", "database", "user"] {
            let mut config = valid_config();
            match field {
                "host" => config.target.host.clear(),
                "database" => config.target.database.clear(),
                _ => config.target.user.clear(),
            }
            let err = validate(&config).unwrap_err();
            assert!(err.to_string().contains(field), "{}", err);
        }
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config = valid_config();
        config.target.ssl_mode = "prefer-ish".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_connect_timeout() {
        let mut config = valid_config();
        config.target.connect_timeout_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_table_spec_with_injected_type() {
        let mut config = valid_config();
        config.migration.tables = vec![TableSpec::new(
            "leagues",
            "League",
            &[("id", "INTEGER); DROP TABLE players; --")],
        )];
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("leagues"));
    }

    #[test]
    fn test_duplicate_tables_and_columns() {
        let mut config = valid_config();
        let leagues = TableSpec::new("leagues", "League", &[("id", "INTEGER")]);
        config.migration.tables = vec![leagues.clone(), leagues];
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.migration.tables = vec![TableSpec::new(
            "leagues",
            "League",
            &[("id", "INTEGER"), ("id", "TEXT")],
        )];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_table_without_columns() {
        let mut config = valid_config();
        config.migration.tables = vec![TableSpec::new("leagues", "League", &[])];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}
