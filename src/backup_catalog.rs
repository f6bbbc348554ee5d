use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::backup::{Backup, BackupType};
use crate::backup_catalog_error::BackupCatalogError;
use crate::backup_record::BackupRecord;
use crate::config::BACKUP_DB_OBJECT_NAME;
use crate::object_store_driver::ObjectStoreDriver;

/// Persisted `backup_time -> Backup` mapping for one dataset, stored at
/// `<prefix?>/<filesystem>/backup.db`.
pub struct BackupCatalog {
    store: Arc<dyn ObjectStoreDriver>,
    filesystem: String,
    prefix: Option<String>,
    backups: BTreeMap<String, Backup>,
}

impl BackupCatalog {
    fn db_key(filesystem: &str, prefix: Option<&str>) -> String {
        match prefix {
            Some(prefix) => format!("{prefix}/{filesystem}/{BACKUP_DB_OBJECT_NAME}"),
            None => format!("{filesystem}/{BACKUP_DB_OBJECT_NAME}"),
        }
    }

    /// Loads the catalog for `filesystem`, starting empty if none exists yet.
    pub async fn load(
        store: Arc<dyn ObjectStoreDriver>,
        filesystem: impl Into<String>,
        prefix: Option<String>,
    ) -> Result<Self, BackupCatalogError> {
        let filesystem = filesystem.into();
        let key = Self::db_key(&filesystem, prefix.as_deref());
        let backups = match store.get_small_object(&key).await {
            Ok(bytes) => {
                let records: BTreeMap<String, BackupRecord> = serde_json::from_slice(&bytes)?;
                records
                    .into_iter()
                    .filter_map(|(time, record)| Backup::try_from(record).ok().map(|b| (time, b)))
                    .collect()
            }
            Err(crate::object_store_driver::ObjectStoreError::NotFound(_)) => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            store,
            filesystem,
            prefix,
            backups,
        })
    }

    async fn save(&self) -> Result<(), BackupCatalogError> {
        let key = Self::db_key(&self.filesystem, self.prefix.as_deref());
        let records: BTreeMap<&str, BackupRecord> = self
            .backups
            .iter()
            .map(|(time, backup)| (time.as_str(), BackupRecord::from(backup)))
            .collect();
        let body = serde_json::to_vec(&records)?;
        self.store.put_small_object(&key, Bytes::from(body)).await?;
        Ok(())
    }

    pub fn derive_object_key(&self, backup_time: &str, backup_type: BackupType) -> String {
        let ext = match backup_type {
            BackupType::Full => "full",
            BackupType::Inc => "inc",
        };
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{}/{backup_time}.{ext}", self.filesystem),
            None => format!("{}/{backup_time}.{ext}", self.filesystem),
        }
    }

    /// Adds a backup to the catalog and persists it. Fails if `backup_time`
    /// already exists, is malformed, or `dependency` isn't a known backup
    /// (full or incremental — an incremental's immediate parent can be
    /// either).
    pub async fn create_backup(
        &mut self,
        backup_time: String,
        backup_type: BackupType,
        object_key: String,
        dependency: Option<String>,
        backup_size: u64,
    ) -> Result<Backup, BackupCatalogError> {
        Backup::validate_backup_time(&backup_time)?;
        if self.backups.contains_key(&backup_time) {
            return Err(BackupCatalogError::BackupExists {
                filesystem: self.filesystem.clone(),
                backup_time,
            });
        }
        if let Some(dep) = &dependency {
            Backup::validate_backup_time(dep)?;
            if !self.backups.contains_key(dep) {
                return Err(BackupCatalogError::MissingDependency {
                    backup_time,
                    dependency: dep.clone(),
                });
            }
        }
        let backup = Backup {
            backup_time: backup_time.clone(),
            backup_type,
            filesystem: self.filesystem.clone(),
            object_key,
            dependency,
            backup_size,
        };
        self.backups.insert(backup_time, backup.clone());
        self.save().await?;
        Ok(backup)
    }

    pub async fn delete_backup(&mut self, backup_time: &str) -> Result<(), BackupCatalogError> {
        if self.backups.remove(backup_time).is_none() {
            return Err(BackupCatalogError::NotFound {
                filesystem: self.filesystem.clone(),
                backup_time: backup_time.to_string(),
            });
        }
        self.save().await?;
        Ok(())
    }

    pub fn get_backup(&self, backup_time: &str) -> Option<&Backup> {
        self.backups.get(backup_time)
    }

    pub fn get_backups(&self, backup_type: Option<BackupType>) -> Vec<&Backup> {
        self.backups
            .values()
            .filter(|b| match backup_type {
                Some(t) => b.backup_type == t,
                None => true,
            })
            .collect()
    }

    pub fn get_backup_times(&self, backup_type: Option<BackupType>) -> Vec<&str> {
        self.get_backups(backup_type)
            .into_iter()
            .map(|b| b.backup_time.as_str())
            .collect()
    }

    /// Backups whose `dependency` points at `backup_time`.
    pub fn dependants_of<'a>(&'a self, backup_time: &'a str) -> impl Iterator<Item = &'a Backup> {
        self.backups
            .values()
            .filter(move |b| b.dependency.as_deref() == Some(backup_time))
    }

    pub fn filesystem(&self) -> &str {
        &self.filesystem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeObjectStore;

    fn store() -> Arc<FakeObjectStore> {
        Arc::new(FakeObjectStore::new())
    }

    #[tokio::test]
    async fn create_backup_rejects_duplicate_backup_time() {
        let mut catalog = BackupCatalog::load(store(), "tank/data", None).await.unwrap();
        catalog
            .create_backup("20260101_000000".into(), BackupType::Full, "k".into(), None, 10)
            .await
            .unwrap();
        let err = catalog
            .create_backup("20260101_000000".into(), BackupType::Full, "k2".into(), None, 20)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupCatalogError::BackupExists { .. }));
    }

    #[tokio::test]
    async fn create_backup_rejects_dependency_on_unknown_full() {
        let mut catalog = BackupCatalog::load(store(), "tank/data", None).await.unwrap();
        let err = catalog
            .create_backup(
                "20260102_000000".into(),
                BackupType::Inc,
                "k".into(),
                Some("20260101_000000".into()),
                10,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackupCatalogError::MissingDependency { .. }));
    }

    #[tokio::test]
    async fn create_backup_rejects_malformed_backup_time() {
        let mut catalog = BackupCatalog::load(store(), "tank/data", None).await.unwrap();
        let err = catalog
            .create_backup("not-a-time".into(), BackupType::Full, "k".into(), None, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupCatalogError::BadFormat { .. }));
    }

    #[tokio::test]
    async fn delete_backup_on_unknown_time_is_not_found() {
        let mut catalog = BackupCatalog::load(store(), "tank/data", None).await.unwrap();
        let err = catalog.delete_backup("20260101_000000").await.unwrap_err();
        assert!(matches!(err, BackupCatalogError::NotFound { .. }));
    }

    #[tokio::test]
    async fn save_and_reload_round_trips_through_the_fake_store() {
        let backing = store();
        let mut catalog = BackupCatalog::load(backing.clone(), "tank/data", Some("prefix".into()))
            .await
            .unwrap();
        catalog
            .create_backup("20260101_000000".into(), BackupType::Full, "k".into(), None, 42)
            .await
            .unwrap();

        let reloaded = BackupCatalog::load(backing, "tank/data", Some("prefix".into())).await.unwrap();
        let backup = reloaded.get_backup("20260101_000000").unwrap();
        assert_eq!(backup.backup_size, 42);
        assert!(backup.is_full());
    }
}
