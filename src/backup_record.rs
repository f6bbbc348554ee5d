use serde::{Deserialize, Serialize};

use crate::backup::{Backup, BackupType};

const RECORD_TYPE: &str = "Backup";

/// Self-describing on-the-wire form of a [`Backup`]. The `_type`
/// discriminator lets the catalog loader reject records written by
/// something else sharing the same object key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    #[serde(rename = "_type")]
    pub record_type: String,
    pub backup_time: String,
    pub backup_type: BackupType,
    pub filesystem: String,
    pub s3_key: String,
    pub dependency: Option<String>,
    pub backup_size: u64,
}

impl From<&Backup> for BackupRecord {
    fn from(backup: &Backup) -> Self {
        Self {
            record_type: RECORD_TYPE.to_string(),
            backup_time: backup.backup_time.clone(),
            backup_type: backup.backup_type,
            filesystem: backup.filesystem.clone(),
            s3_key: backup.object_key.clone(),
            dependency: backup.dependency.clone(),
            backup_size: backup.backup_size,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("record has _type {0:?}, expected \"Backup\"")]
pub struct ForeignRecord(String);

impl TryFrom<BackupRecord> for Backup {
    type Error = ForeignRecord;

    fn try_from(record: BackupRecord) -> Result<Self, Self::Error> {
        if record.record_type != RECORD_TYPE {
            return Err(ForeignRecord(record.record_type));
        }
        Ok(Backup {
            backup_time: record.backup_time,
            backup_type: record.backup_type,
            filesystem: record.filesystem,
            object_key: record.s3_key,
            dependency: record.dependency,
            backup_size: record.backup_size,
        })
    }
}
