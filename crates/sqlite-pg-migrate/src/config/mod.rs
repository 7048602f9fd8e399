//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl TargetConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// `host:port/database`, for log lines and error context.
    pub fn display_name(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;

    const MINIMAL: &str = r#"
source:
  path: ./database.sqlite
target:
  host: localhost
  database: soccer
  user: postgres
  password: secret
"#;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.source.r#type, "sqlite");
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.schema, "public");
        assert_eq!(config.target.ssl_mode, "disable");
        assert_eq!(config.target.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.migration.target_mode, TargetMode::FailIfExists);
        assert_eq!(config.migration.max_rejection_samples, 5);

        let names: Vec<_> = config
            .migration
            .table_specs()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["matches", "players", "teams", "leagues"]);
    }

    #[test]
    fn test_custom_tables_and_target_mode() {
        let yaml = format!(
            "{}{}",
            MINIMAL,
            r#"
migration:
  target_mode: drop_recreate
  max_rejection_samples: 2
  tables:
    - name: leagues
      source_table: League
      columns:
        - { name: id, sql_type: SERIAL PRIMARY KEY }
        - { name: name, sql_type: TEXT }
"#
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.migration.target_mode, TargetMode::DropRecreate);
        assert_eq!(config.migration.max_rejection_samples, 2);
        assert_eq!(config.migration.progress_interval, 10_000);

        let specs = config.migration.table_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].source_table, "League");
        assert_eq!(specs[0].column_names(), vec!["id", "name"]);
    }

    #[test]
    fn test_unknown_target_mode_is_rejected() {
        let yaml = format!("{}migration:\n  target_mode: upsert\n", MINIMAL);
        assert!(matches!(
            Config::from_yaml(&yaml),
            Err(MigrateError::Yaml(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/config.yaml").unwrap_err();
        assert!(matches!(err, MigrateError::Io(_)));
    }

    #[test]
    fn test_display_name() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.target.display_name(), "localhost:5432/soccer");
    }
}
