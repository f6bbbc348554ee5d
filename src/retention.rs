use tracing::info;

use crate::backup::BackupType;
use crate::backup_catalog::BackupCatalog;
use crate::backup_catalog_error::BackupCatalogError;
use crate::dataset_error::DatasetError;
use crate::job_error::BackupError;
use crate::object_store_driver::ObjectStoreDriver;
use crate::snapshot_catalog::SnapshotCatalog;
use std::sync::Arc;

/// Destroys the oldest local snapshots past `max_snapshots`, never touching
/// one that backs a full backup.
pub async fn limit_snapshots(
    snapshots: &mut SnapshotCatalog,
    catalog: &BackupCatalog,
    max_snapshots: usize,
) -> Result<(), DatasetError> {
    let full_times: Vec<String> = catalog
        .get_backup_times(Some(BackupType::Full))
        .into_iter()
        .map(str::to_owned)
        .collect();
    let mut live: Vec<String> = snapshots.get_snapshot_names().map(str::to_owned).collect();
    live.sort();

    let mut idx = 0;
    while live.len() - idx > max_snapshots {
        let name = &live[idx];
        if !full_times.contains(name) {
            snapshots.delete_snapshot(name).await?;
            info!(snapshot = %name, "retention: removed snapshot");
        }
        idx += 1;
    }
    Ok(())
}

/// Dependant-aware, chain-pruning backup limiter. Never orphans an
/// incremental by deleting the full it depends on without also deleting the
/// incremental.
/// Returns `true` when, after pruning, exactly one full backup remains and
/// the caller should take a fresh incremental so a recovery point beyond
/// the last full always exists.
pub async fn limit_backups(
    catalog: &mut BackupCatalog,
    store: &Arc<dyn ObjectStoreDriver>,
    max_backups: usize,
) -> Result<bool, BackupError> {
    loop {
        let mut ascending: Vec<String> = catalog
            .get_backups(None)
            .into_iter()
            .map(|b| b.backup_time.clone())
            .collect();
        ascending.sort();
        if ascending.len() <= max_backups {
            break;
        }

        let oldest = ascending[0].clone();
        let has_dependant = catalog.dependants_of(&oldest).next().is_some();
        if !has_dependant {
            delete_one(catalog, store, &oldest).await?;
            continue;
        }

        // Delete the contiguous run of dependents after `oldest`, up to
        // (but excluding) the next full backup.
        let mut to_delete = Vec::new();
        for time in ascending.iter().skip(1) {
            let backup_type = catalog
                .get_backup(time)
                .map(|b| b.backup_type)
                .unwrap_or(BackupType::Inc);
            if backup_type == BackupType::Full {
                break;
            }
            to_delete.push(time.clone());
        }
        if to_delete.is_empty() {
            // oldest has a dependant but nothing contiguous was collected
            // (shouldn't happen given the invariant above); avoid looping
            // forever.
            break;
        }
        for time in to_delete {
            delete_one(catalog, store, &time).await?;
        }
    }

    let remaining = catalog.get_backups(None);
    let needs_followup = remaining.len() == 1 && remaining[0].is_full();
    if needs_followup {
        info!("retention: only a full backup remains, taking a fresh incremental");
    }
    Ok(needs_followup)
}

async fn delete_one(
    catalog: &mut BackupCatalog,
    store: &Arc<dyn ObjectStoreDriver>,
    backup_time: &str,
) -> Result<(), BackupError> {
    let object_key = catalog
        .get_backup(backup_time)
        .map(|b| b.object_key.clone())
        .ok_or_else(|| {
            BackupCatalogError::NotFound {
                filesystem: catalog.filesystem().to_string(),
                backup_time: backup_time.to_string(),
            }
        })?;
    store.delete_object(&object_key).await?;
    catalog.delete_backup(backup_time).await?;
    info!(backup_time, "retention: removed backup");
    Ok(())
}
