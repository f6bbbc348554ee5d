use std::collections::HashMap;

use async_trait::async_trait;

use crate::dataset_error::DatasetError;
use crate::snapshot::Snapshot;
use crate::zfs_create_filesystem::zfs_create_filesystem;
use crate::zfs_create_snapshot::zfs_create_snapshot;
use crate::zfs_destroy_filesystem::zfs_destroy_filesystem;
use crate::zfs_destroy_snapshot::zfs_destroy_snapshot;
use crate::zfs_list_snapshots::zfs_list_snapshots;
use crate::zfs_receive::{zfs_open_receive_stream, ReceiveStream};
use crate::zfs_rollback_filesystem::zfs_rollback_filesystem;
use crate::zfs_send::{zfs_open_send_stream, zfs_open_send_stream_inc, SendStream};
use crate::zfs_send_size::{zfs_send_size, zfs_send_size_inc};

/// Abstract shell over the local dataset tool (`zfs`). Exists so the Job
/// Engine can be exercised against an in-memory fake in tests instead of a
/// real zpool.
#[async_trait]
pub trait DatasetDriver: Send + Sync {
    async fn list_snapshots(&self) -> Result<Vec<Snapshot>, DatasetError>;
    async fn create_snapshot(&self, filesystem: &str, name: &str) -> Result<(), DatasetError>;
    async fn destroy_snapshot(&self, filesystem: &str, name: &str) -> Result<(), DatasetError>;
    async fn destroy_filesystem(&self, filesystem: &str) -> Result<(), DatasetError>;
    async fn rollback_filesystem(
        &self,
        filesystem: &str,
        snapshot_name: &str,
    ) -> Result<(), DatasetError>;
    async fn create_filesystem(&self, filesystem: &str) -> Result<(), DatasetError>;
    async fn send_size(&self, filesystem: &str, name: &str) -> Result<u64, DatasetError>;
    async fn send_size_inc(
        &self,
        filesystem: &str,
        from_name: &str,
        to_name: &str,
    ) -> Result<u64, DatasetError>;
    fn open_send_stream(&self, filesystem: &str, name: &str) -> Result<SendStream, DatasetError>;
    fn open_send_stream_inc(
        &self,
        filesystem: &str,
        from_name: &str,
        to_name: &str,
    ) -> Result<SendStream, DatasetError>;
    fn open_receive_stream(
        &self,
        filesystem: &str,
        name: &str,
    ) -> Result<ReceiveStream, DatasetError>;
}

/// Real [`DatasetDriver`] that shells out to the `zfs` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessDatasetDriver;

#[async_trait]
impl DatasetDriver for ProcessDatasetDriver {
    async fn list_snapshots(&self) -> Result<Vec<Snapshot>, DatasetError> {
        let rows = zfs_list_snapshots().await?;
        let mut snapshots = Vec::with_capacity(rows.len());
        for (key, row) in rows {
            let Some((filesystem, name)) = key.split_once('@') else {
                continue;
            };
            let referenced = row
                .get("REFER")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default();
            let used = row.get("USED").and_then(|v| v.parse().ok()).unwrap_or_default();
            snapshots.push(Snapshot {
                filesystem: filesystem.to_string(),
                name: name.to_string(),
                referenced,
                used,
            });
        }
        Ok(snapshots)
    }

    async fn create_snapshot(&self, filesystem: &str, name: &str) -> Result<(), DatasetError> {
        zfs_create_snapshot(filesystem, name).await
    }

    async fn destroy_snapshot(&self, filesystem: &str, name: &str) -> Result<(), DatasetError> {
        zfs_destroy_snapshot(filesystem, name).await
    }

    async fn destroy_filesystem(&self, filesystem: &str) -> Result<(), DatasetError> {
        zfs_destroy_filesystem(filesystem).await
    }

    async fn rollback_filesystem(
        &self,
        filesystem: &str,
        snapshot_name: &str,
    ) -> Result<(), DatasetError> {
        zfs_rollback_filesystem(filesystem, snapshot_name).await
    }

    async fn create_filesystem(&self, filesystem: &str) -> Result<(), DatasetError> {
        zfs_create_filesystem(filesystem).await
    }

    async fn send_size(&self, filesystem: &str, name: &str) -> Result<u64, DatasetError> {
        zfs_send_size(filesystem, name).await
    }

    async fn send_size_inc(
        &self,
        filesystem: &str,
        from_name: &str,
        to_name: &str,
    ) -> Result<u64, DatasetError> {
        zfs_send_size_inc(filesystem, from_name, to_name).await
    }

    fn open_send_stream(&self, filesystem: &str, name: &str) -> Result<SendStream, DatasetError> {
        zfs_open_send_stream(filesystem, name)
    }

    fn open_send_stream_inc(
        &self,
        filesystem: &str,
        from_name: &str,
        to_name: &str,
    ) -> Result<SendStream, DatasetError> {
        zfs_open_send_stream_inc(filesystem, from_name, to_name)
    }

    fn open_receive_stream(
        &self,
        filesystem: &str,
        name: &str,
    ) -> Result<ReceiveStream, DatasetError> {
        zfs_open_receive_stream(filesystem, name)
    }
}

/// Helper used by [`crate::snapshot_catalog::SnapshotCatalog`] to index
/// snapshots by filesystem.
pub fn group_by_filesystem(snapshots: Vec<Snapshot>) -> HashMap<String, Vec<Snapshot>> {
    let mut grouped: HashMap<String, Vec<Snapshot>> = HashMap::new();
    for snapshot in snapshots {
        grouped.entry(snapshot.filesystem.clone()).or_default().push(snapshot);
    }
    grouped
}
