//! Destination schema provisioning.
//!
//! All tables are created inside one transaction: either every table in the
//! layout exists afterwards or none of them was touched.

use tracing::{error, info};

use crate::config::TargetMode;
use crate::core::identifier::qualify;
use crate::core::schema::TableSpec;
use crate::error::{MigrateError, Result};
use crate::target::TargetWriter;

/// Create every table in `specs`.
///
/// With [`TargetMode::FailIfExists`] an existing table aborts provisioning
/// with [`MigrateError::TableExists`]. With [`TargetMode::DropRecreate`] it
/// is dropped first, along with the rows it held.
pub async fn provision(
    target: &mut dyn TargetWriter,
    specs: &[TableSpec],
    mode: TargetMode,
) -> Result<()> {
    target.begin().await?;

    match create_tables(target, specs, mode).await {
        Ok(()) => {
            target.commit().await?;
            info!(
                "Provisioned {} tables in schema {}",
                specs.len(),
                target.schema()
            );
            Ok(())
        }
        Err(e) => {
            error!("Schema provisioning failed, rolling back: {}", e);
            if let Err(rollback_err) = target.rollback().await {
                error!("Rollback after provisioning failure failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

async fn create_tables(
    target: &mut dyn TargetWriter,
    specs: &[TableSpec],
    mode: TargetMode,
) -> Result<()> {
    for spec in specs {
        if target.table_exists(&spec.name).await? {
            match mode {
                TargetMode::FailIfExists => {
                    return Err(MigrateError::TableExists(qualify(
                        target.schema(),
                        &spec.name,
                    )));
                }
                TargetMode::DropRecreate => {
                    info!("Dropping existing table {}.{}", target.schema(), spec.name);
                    target.drop_table(&spec.name).await?;
                }
            }
        }

        target
            .create_table(spec)
            .await
            .map_err(|e| MigrateError::provision(&spec.name, e))?;
        info!("Created table {}.{}", target.schema(), spec.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::soccer_tables;
    use crate::core::value::BindValue;
    use crate::target::memory::MemoryTarget;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_creates_every_table() {
        let mut target = MemoryTarget::new();
        provision(&mut target, &soccer_tables(), TargetMode::FailIfExists)
            .await
            .unwrap();

        let names: Vec<_> = target.tables.keys().cloned().collect();
        assert_eq!(names, vec!["leagues", "matches", "players", "teams"]);
        assert_eq!(target.log.first().map(String::as_str), Some("BEGIN"));
        assert_eq!(target.log.last().map(String::as_str), Some("COMMIT"));

        let players = &target.tables["players"];
        let types: Vec<_> = players.columns.iter().map(|c| c.data_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["integer", "numeric", "text", "numeric", "text", "double precision", "integer"]
        );
    }

    #[tokio::test]
    async fn test_existing_table_fails_without_touching_anything() {
        let specs = soccer_tables();
        let mut target = MemoryTarget::new().with_table(&specs[2]);
        let mut row = BTreeMap::new();
        row.insert("id".to_string(), BindValue::Integer(1));
        target.tables.get_mut("teams").unwrap().rows.push(row);

        let err = provision(&mut target, &specs, TargetMode::FailIfExists)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::TableExists(ref t) if t == "\"public\".\"teams\""));

        // matches and players were created before teams was checked; all rolled back
        assert_eq!(target.tables.len(), 1);
        assert_eq!(target.rows("teams").len(), 1);
        assert!(!target.log.iter().any(|s| s.starts_with("DROP")));
        assert_eq!(target.log.last().map(String::as_str), Some("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_drop_recreate_replaces_existing_table() {
        let specs = soccer_tables();
        let mut target = MemoryTarget::new().with_table(&specs[3]);
        let mut row = BTreeMap::new();
        row.insert("id".to_string(), BindValue::Integer(1));
        target.tables.get_mut("leagues").unwrap().rows.push(row);

        provision(&mut target, &specs, TargetMode::DropRecreate)
            .await
            .unwrap();

        assert_eq!(target.tables.len(), 4);
        assert!(target.rows("leagues").is_empty());
        assert!(target.log.contains(&"DROP leagues".to_string()));
    }

    #[tokio::test]
    async fn test_ddl_failure_rolls_back_earlier_tables() {
        let mut target = MemoryTarget::new();
        target.fail_create = Some("teams".to_string());

        let err = provision(&mut target, &soccer_tables(), TargetMode::FailIfExists)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Provision { ref table, .. } if table == "teams"));
        assert!(target.tables.is_empty());
        assert!(!target.in_transaction());
    }
}
