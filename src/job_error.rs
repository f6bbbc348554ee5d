use crate::backup_catalog_error::BackupCatalogError;
use crate::dataset_error::DatasetError;
use crate::object_store_driver::ObjectStoreError;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
    #[error("object store error: {0}")]
    ObjectStore(#[from] ObjectStoreError),
    #[error("catalog error: {0}")]
    Catalog(#[from] BackupCatalogError),
    #[error("uploaded size {uploaded} does not match sent size {expected} for {object_key}")]
    SizeMismatch {
        object_key: String,
        expected: u64,
        uploaded: u64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
    #[error("object store error: {0}")]
    ObjectStore(#[from] ObjectStoreError),
    #[error("catalog error: {0}")]
    Catalog(#[from] BackupCatalogError),
    #[error("no backups recorded for {filesystem}")]
    NoBackups { filesystem: String },
    #[error("backup {backup_time:?} depends on {dependency:?}, which is missing from the catalog")]
    BrokenChain {
        backup_time: String,
        dependency: String,
    },
}
