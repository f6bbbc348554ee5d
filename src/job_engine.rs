use std::sync::Arc;

use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{info, warn};

use crate::backup::BackupType;
use crate::backup_catalog::BackupCatalog;
use crate::dataset_config::DatasetConfig;
use crate::dataset_driver::DatasetDriver;
use crate::job_error::{BackupError, RestoreError};
use crate::object_store_driver::ObjectStoreDriver;
use crate::retention::{limit_backups, limit_snapshots};
use crate::snapshot_catalog::SnapshotCatalog;
use crate::transfer_controller::{chunk_size_for, logging_progress_callback};

/// Orchestrates one backup run or one restore run for a single dataset.
/// Holds non-owning references to both catalogs for the run's lifetime.
pub struct JobEngine {
    pub config: DatasetConfig,
    pub dataset: Arc<dyn DatasetDriver>,
    pub store: Arc<dyn ObjectStoreDriver>,
}

impl JobEngine {
    pub fn new(config: DatasetConfig, dataset: Arc<dyn DatasetDriver>, store: Arc<dyn ObjectStoreDriver>) -> Self {
        Self { config, dataset, store }
    }

    async fn open_catalog(&self) -> Result<BackupCatalog, BackupError> {
        Ok(BackupCatalog::load(
            self.store.clone(),
            self.config.filesystem.clone(),
            self.config.prefix.clone(),
        )
        .await?)
    }

    /// Runs one backup: decide full vs. incremental, stream, record, then
    /// enforce retention.
    pub async fn run(&self) -> Result<(), BackupError> {
        let mut catalog = self.open_catalog().await?;
        let mut snapshots = SnapshotCatalog::new(self.dataset.clone(), self.config.filesystem.clone());
        snapshots.refresh().await?;

        self.run_once(&mut catalog, &mut snapshots).await?;

        if let Some(max_snapshots) = self.config.max_snapshots {
            limit_snapshots(&mut snapshots, &catalog, max_snapshots).await?;
        }
        if let Some(max_backups) = self.config.max_backups {
            let needs_followup = limit_backups(&mut catalog, &self.store, max_backups).await?;
            if needs_followup {
                self.run_once(&mut catalog, &mut snapshots).await?;
            }
        }
        Ok(())
    }

    async fn run_once(
        &self,
        catalog: &mut BackupCatalog,
        snapshots: &mut SnapshotCatalog,
    ) -> Result<(), BackupError> {
        let fulls = catalog.get_backup_times(Some(BackupType::Full));
        let latest_full = fulls.last().map(|s| s.to_string());

        let take_full = match &latest_full {
            None => true,
            Some(_) if self.config.max_incremental_backups_per_full == Some(0) => true,
            Some(full_time) => {
                if let Some(limit) = self.config.max_incremental_backups_per_full {
                    let count = catalog
                        .get_backups(Some(BackupType::Inc))
                        .into_iter()
                        .filter(|b| b.dependency.as_deref() == Some(full_time.as_str()))
                        .count();
                    count >= limit
                } else {
                    false
                }
            }
        };

        if take_full {
            self.take_full(catalog, snapshots).await
        } else {
            let parent = catalog
                .get_backups(None)
                .into_iter()
                .map(|b| b.backup_time.clone())
                .max()
                .expect("latest_full is Some, so at least one backup exists");
            self.take_incremental(catalog, snapshots, parent).await
        }
    }

    async fn take_full(
        &self,
        catalog: &mut BackupCatalog,
        snapshots: &mut SnapshotCatalog,
    ) -> Result<(), BackupError> {
        let snapshot = snapshots.create_snapshot().await?;
        let send_size = self.dataset.send_size(&self.config.filesystem, &snapshot.name).await?;
        let chunk_size = chunk_size_for(send_size);
        let object_key = catalog.derive_object_key(&snapshot.name, BackupType::Full);

        let mut stream_handle = self.dataset.open_send_stream(&self.config.filesystem, &snapshot.name)?;
        self.upload(&object_key, stream_handle.stdout, send_size, chunk_size).await?;
        stream_handle.wait().await?;

        self.assert_uploaded_size(&object_key, send_size).await?;
        catalog
            .create_backup(snapshot.name.clone(), BackupType::Full, object_key, None, send_size)
            .await?;
        info!(filesystem = %self.config.filesystem, snapshot_name = %snapshot.name, "took full backup");
        Ok(())
    }

    async fn take_incremental(
        &self,
        catalog: &mut BackupCatalog,
        snapshots: &mut SnapshotCatalog,
        parent: String,
    ) -> Result<(), BackupError> {
        let snapshot = snapshots.create_snapshot().await?;
        let send_size = self
            .dataset
            .send_size_inc(&self.config.filesystem, &parent, &snapshot.name)
            .await?;
        let chunk_size = chunk_size_for(send_size);
        let object_key = catalog.derive_object_key(&snapshot.name, BackupType::Inc);

        let mut stream_handle =
            self.dataset
                .open_send_stream_inc(&self.config.filesystem, &parent, &snapshot.name)?;
        self.upload(&object_key, stream_handle.stdout, send_size, chunk_size).await?;
        stream_handle.wait().await?;

        self.assert_uploaded_size(&object_key, send_size).await?;
        catalog
            .create_backup(
                snapshot.name.clone(),
                BackupType::Inc,
                object_key,
                Some(parent),
                send_size,
            )
            .await?;
        info!(filesystem = %self.config.filesystem, snapshot_name = %snapshot.name, "took incremental backup");
        Ok(())
    }

    async fn upload(
        &self,
        object_key: &str,
        reader: impl tokio::io::AsyncRead + Unpin + Send + 'static,
        total_size: u64,
        chunk_size: u64,
    ) -> Result<(), BackupError> {
        let body = Box::pin(ReaderStream::new(reader));
        let on_progress = Some(logging_progress_callback(object_key.to_string()));
        self.store
            .put_object_streamed(object_key, body, total_size, chunk_size, on_progress)
            .await?;
        Ok(())
    }

    async fn assert_uploaded_size(&self, object_key: &str, expected: u64) -> Result<(), BackupError> {
        let uploaded = self.store.head_object_size(object_key).await?;
        if uploaded == 0 || uploaded != expected {
            return Err(BackupError::SizeMismatch {
                object_key: object_key.to_string(),
                expected,
                uploaded,
            });
        }
        Ok(())
    }

    /// Restores `backup_time` (defaults to the most recent backup) into
    /// `destination` (defaults to the source filesystem).
    pub async fn restore(
        &self,
        backup_time: Option<String>,
        destination: Option<String>,
    ) -> Result<(), RestoreError> {
        let catalog = self.open_catalog().await?;
        let mut snapshots = SnapshotCatalog::new(self.dataset.clone(), self.config.filesystem.clone());
        snapshots.refresh().await?;

        let target_time = match backup_time {
            Some(t) => t,
            None => catalog
                .get_backup_times(None)
                .last()
                .map(|s| s.to_string())
                .ok_or_else(|| RestoreError::NoBackups {
                    filesystem: self.config.filesystem.clone(),
                })?,
        };

        let chain = self.resolve_chain(&catalog, &target_time)?;
        let in_place = destination.is_none();
        let destination = destination.unwrap_or_else(|| self.config.filesystem.clone());

        if in_place {
            self.reconcile(&mut snapshots, &target_time).await?;
        } else {
            self.dataset.create_filesystem(&destination).await.ok();
        }

        for backup in &chain {
            if in_place && snapshots.contains(&backup.backup_time) {
                continue;
            }
            self.replay(&destination, backup).await?;
        }

        snapshots.refresh().await?;
        info!(filesystem = %self.config.filesystem, destination = %destination, backup_time = %target_time, "restore complete");
        Ok(())
    }

    fn resolve_chain<'a>(
        &self,
        catalog: &'a BackupCatalog,
        target_time: &str,
    ) -> Result<Vec<crate::backup::Backup>, RestoreError> {
        let target = catalog
            .get_backup(target_time)
            .cloned()
            .ok_or_else(|| RestoreError::NoBackups {
                filesystem: self.config.filesystem.clone(),
            })?;
        let mut chain = vec![target];
        while let Some(dep) = chain.last().unwrap().dependency.clone() {
            let parent = catalog.get_backup(&dep).cloned().ok_or_else(|| RestoreError::BrokenChain {
                backup_time: chain.last().unwrap().backup_time.clone(),
                dependency: dep.clone(),
            })?;
            chain.push(parent);
        }
        chain.reverse();
        Ok(chain)
    }

    async fn reconcile(&self, snapshots: &mut SnapshotCatalog, target_time: &str) -> Result<(), RestoreError> {
        let newer: Vec<String> = snapshots
            .get_snapshot_names()
            .filter(|name| *name > target_time)
            .map(str::to_string)
            .collect();
        for name in newer {
            snapshots.delete_snapshot(&name).await?;
        }
        snapshots.refresh().await?;

        let most_recent = snapshots.get_snapshot_names().map(str::to_string).last();
        match most_recent {
            Some(name) => {
                self.dataset.rollback_filesystem(&self.config.filesystem, &name).await?;
            }
            None => {
                self.dataset.destroy_filesystem(&self.config.filesystem).await?;
            }
        }
        snapshots.refresh().await?;
        Ok(())
    }

    async fn replay(&self, destination: &str, backup: &crate::backup::Backup) -> Result<(), RestoreError> {
        let mut receive = self.dataset.open_receive_stream(destination, &backup.backup_time)?;
        let mut stdin = receive.stdin;
        let on_progress = Some(logging_progress_callback(backup.object_key.clone()));

        let chunks = self.store.get_object_streamed(&backup.object_key, on_progress).await?;
        let mut reader = StreamReader::new(chunks);
        let copy_result = tokio::io::copy(&mut reader, &mut stdin).await;
        match copy_result {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                warn!(object_key = %backup.object_key, "receive closed stdin early, tolerating");
            }
            Err(e) => return Err(crate::dataset_error::DatasetError::Wait(e).into()),
        }
        drop(stdin);
        receive.wait().await?;
        info!(filesystem = %destination, backup_time = %backup.backup_time, s3_key = %backup.object_key, "replayed backup");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dataset_config::DatasetConfig;
    use crate::test_support::{FakeDatasetDriver, FakeObjectStore};

    fn test_config(filesystem: &str) -> DatasetConfig {
        DatasetConfig {
            filesystem: filesystem.to_string(),
            bucket_name: "test-bucket".to_string(),
            access_key: "key".to_string(),
            secret_key: "secret".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            prefix: None,
            cron: None,
            max_snapshots: None,
            max_backups: None,
            max_incremental_backups_per_full: None,
            storage_class: String::new(),
        }
    }

    fn engine(config: DatasetConfig, dataset: Arc<FakeDatasetDriver>, store: Arc<FakeObjectStore>) -> JobEngine {
        JobEngine::new(config, dataset, store)
    }

    #[tokio::test]
    async fn first_run_takes_a_full_backup() {
        let dataset = Arc::new(FakeDatasetDriver::new());
        let store = Arc::new(FakeObjectStore::new());
        let job = engine(test_config("tank/data"), dataset, store);

        job.run().await.unwrap();

        let catalog = job.open_catalog().await.unwrap();
        assert_eq!(catalog.get_backup_times(Some(BackupType::Full)).len(), 1);
        assert!(catalog.get_backup_times(Some(BackupType::Inc)).is_empty());
    }

    /// The second run's immediate parent is the full; the third run's
    /// parent is the second run's incremental, not the full. With
    /// `max_incremental_backups_per_full` left unset (the default,
    /// unlimited chain) this is the path that used to be rejected by the
    /// catalog's old full-only dependency check.
    #[tokio::test]
    async fn later_runs_chain_off_the_most_recent_backup_of_any_type() {
        let dataset = Arc::new(FakeDatasetDriver::new());
        let store = Arc::new(FakeObjectStore::new());
        let job = engine(test_config("tank/data"), dataset, store);

        job.run().await.unwrap();
        job.run().await.unwrap();
        job.run().await.unwrap();

        let catalog = job.open_catalog().await.unwrap();
        let full_time = catalog.get_backup_times(Some(BackupType::Full))[0].to_string();
        let mut inc_times: Vec<String> = catalog
            .get_backup_times(Some(BackupType::Inc))
            .into_iter()
            .map(str::to_string)
            .collect();
        inc_times.sort();
        assert_eq!(inc_times.len(), 2, "two incrementals after three runs");

        let first_inc = catalog.get_backup(&inc_times[0]).unwrap();
        assert_eq!(first_inc.dependency.as_deref(), Some(full_time.as_str()));

        let second_inc = catalog.get_backup(&inc_times[1]).unwrap();
        assert_eq!(
            second_inc.dependency.as_deref(),
            Some(inc_times[0].as_str()),
            "third run must depend on the prior incremental, not the full"
        );
    }

    /// A `max_backups` cap of 1 prunes nothing on the very first run (one
    /// backup is already at the cap), but since only a full remains,
    /// `run` immediately takes a follow-up incremental so a recovery
    /// point newer than the bare full always exists.
    #[tokio::test]
    async fn retention_with_a_tight_cap_triggers_an_immediate_follow_up_incremental() {
        let dataset = Arc::new(FakeDatasetDriver::new());
        let store = Arc::new(FakeObjectStore::new());
        let mut config = test_config("tank/data");
        config.max_backups = Some(1);
        let job = engine(config, dataset, store);

        job.run().await.unwrap();

        let catalog = job.open_catalog().await.unwrap();
        assert_eq!(catalog.get_backup_times(Some(BackupType::Full)).len(), 1);
        assert_eq!(catalog.get_backup_times(Some(BackupType::Inc)).len(), 1);
    }

    #[tokio::test]
    async fn restore_to_an_alternate_destination_replays_the_full_chain() {
        let dataset = Arc::new(FakeDatasetDriver::new());
        let store = Arc::new(FakeObjectStore::new());
        let job = engine(test_config("tank/data"), dataset.clone(), store);

        job.run().await.unwrap();
        job.run().await.unwrap();

        job.restore(None, Some("tank/restored".to_string())).await.unwrap();

        let catalog = job.open_catalog().await.unwrap();
        let full_time = catalog.get_backup_times(Some(BackupType::Full))[0].to_string();
        let inc_time = catalog.get_backup_times(Some(BackupType::Inc))[0].to_string();

        assert_eq!(
            dataset.received_content("tank/restored", &full_time),
            Some(bytes::Bytes::from(full_time.clone().into_bytes())),
        );
        assert_eq!(
            dataset.received_content("tank/restored", &inc_time),
            Some(bytes::Bytes::from(inc_time.clone().into_bytes())),
        );
    }

    #[tokio::test]
    async fn in_place_restore_reconciles_newer_snapshots_before_replaying() {
        let dataset = Arc::new(FakeDatasetDriver::new());
        let store = Arc::new(FakeObjectStore::new());
        let job = engine(test_config("tank/data"), dataset.clone(), store);

        job.run().await.unwrap();
        job.run().await.unwrap();

        let catalog = job.open_catalog().await.unwrap();
        let full_time = catalog.get_backup_times(Some(BackupType::Full))[0].to_string();
        drop(catalog);

        job.restore(Some(full_time.clone()), None).await.unwrap();

        let mut snapshots = SnapshotCatalog::new(job.dataset.clone(), "tank/data".to_string());
        snapshots.refresh().await.unwrap();
        let remaining: Vec<&str> = snapshots.get_snapshot_names().collect();
        assert_eq!(remaining, vec![full_time.as_str()], "incrementals newer than the target were reconciled away");
    }

    #[tokio::test]
    async fn resolve_chain_orders_full_before_its_dependants() {
        let dataset = Arc::new(FakeDatasetDriver::new());
        let store = Arc::new(FakeObjectStore::new());
        let job = engine(test_config("tank/data"), dataset, store);

        job.run().await.unwrap();
        job.run().await.unwrap();

        let catalog = job.open_catalog().await.unwrap();
        let inc_time = catalog.get_backup_times(Some(BackupType::Inc))[0].to_string();

        let chain = job.resolve_chain(&catalog, &inc_time).unwrap();
        assert_eq!(chain.len(), 2);
        assert!(chain[0].is_full());
        assert_eq!(chain[1].backup_time, inc_time);
    }
}
