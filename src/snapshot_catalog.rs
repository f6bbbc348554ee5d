use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::config::BACKUP_TIME_FORMAT;
use crate::dataset_driver::DatasetDriver;
use crate::dataset_error::DatasetError;
use crate::snapshot::Snapshot;

/// In-memory view of the snapshots that exist locally for one filesystem.
/// Refreshed from the [`DatasetDriver`] on demand; never persisted.
pub struct SnapshotCatalog {
    driver: Arc<dyn DatasetDriver>,
    filesystem: String,
    snapshots: BTreeMap<String, Snapshot>,
}

impl SnapshotCatalog {
    pub fn new(driver: Arc<dyn DatasetDriver>, filesystem: impl Into<String>) -> Self {
        Self {
            driver,
            filesystem: filesystem.into(),
            snapshots: BTreeMap::new(),
        }
    }

    /// Re-reads snapshots from the driver, keeping only ones under our
    /// filesystem.
    pub async fn refresh(&mut self) -> Result<(), DatasetError> {
        let all = self.driver.list_snapshots().await?;
        self.snapshots = all
            .into_iter()
            .filter(|s| s.filesystem == self.filesystem)
            .map(|s| (s.name.clone(), s))
            .collect();
        Ok(())
    }

    /// Creates a snapshot named with the current time, retrying on name
    /// collision by waiting a second — the dataset tool's snapshot names are
    /// only unique to the second.
    pub async fn create_snapshot(&mut self) -> Result<Snapshot, DatasetError> {
        loop {
            let name = Utc::now().format(BACKUP_TIME_FORMAT).to_string();
            if self.snapshots.contains_key(&name) {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }
            self.driver.create_snapshot(&self.filesystem, &name).await?;
            self.refresh().await?;
            return self
                .snapshots
                .get(&name)
                .cloned()
                .ok_or_else(|| DatasetError::UnparseableOutput(format!("newly created snapshot {name} missing after refresh")));
        }
    }

    pub async fn delete_snapshot(&mut self, name: &str) -> Result<(), DatasetError> {
        self.driver.destroy_snapshot(&self.filesystem, name).await?;
        self.snapshots.remove(name);
        Ok(())
    }

    pub fn get_snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.values()
    }

    pub fn get_snapshot_names(&self) -> impl Iterator<Item = &str> {
        self.snapshots.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshots.contains_key(name)
    }
}
