use serde::{Deserialize, Serialize};

use crate::config::BACKUP_TIME_FORMAT;

/// Whether a [`Backup`] stands alone or needs a prior full backup replayed
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Full,
    Inc,
}

impl BackupType {
    pub fn as_str(self) -> &'static str {
        match self {
            BackupType::Full => "full",
            BackupType::Inc => "inc",
        }
    }
}

/// One entry of the Backup Catalog: a snapshot that was sent to the object
/// store, plus enough bookkeeping to restore it and to reason about
/// retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    /// `%Y%m%d_%H%M%S`, also the snapshot name it was taken from.
    pub backup_time: String,
    pub backup_type: BackupType,
    pub filesystem: String,
    pub object_key: String,
    /// `backup_time` of the immediate parent this one replays on top of
    /// (full or incremental). `None` for a full backup.
    pub dependency: Option<String>,
    pub backup_size: u64,
}

impl Backup {
    pub fn is_full(&self) -> bool {
        matches!(self.backup_type, BackupType::Full)
    }

    /// Validates a candidate `backup_time` string against the format the
    /// rest of the catalog assumes.
    pub fn validate_backup_time(backup_time: &str) -> Result<(), crate::backup_catalog_error::BackupCatalogError> {
        chrono::NaiveDateTime::parse_from_str(backup_time, BACKUP_TIME_FORMAT)
            .map(|_| ())
            .map_err(|_| crate::backup_catalog_error::BackupCatalogError::BadFormat {
                backup_time: backup_time.to_string(),
            })
    }
}
