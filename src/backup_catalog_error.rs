/// Errors raised while manipulating the Backup Catalog. Distinct from
/// [`crate::dataset_error::DatasetError`]/object-store errors, which are
/// about the underlying transports rather than catalog invariants.
#[derive(Debug, thiserror::Error)]
pub enum BackupCatalogError {
    #[error("backup {backup_time} already exists for {filesystem}")]
    BackupExists {
        filesystem: String,
        backup_time: String,
    },
    #[error("backup {backup_time} depends on unknown backup {dependency}")]
    MissingDependency {
        backup_time: String,
        dependency: String,
    },
    #[error("{backup_time:?} is not a valid backup_time ({})", crate::config::BACKUP_TIME_FORMAT)]
    BadFormat { backup_time: String },
    #[error("no backup {backup_time:?} for {filesystem}")]
    NotFound {
        filesystem: String,
        backup_time: String,
    },
    #[error("object store error: {0}")]
    ObjectStore(#[from] crate::object_store_driver::ObjectStoreError),
    #[error("catalog is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
