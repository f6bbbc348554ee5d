// IMPORTANT: changing these will make existing backup catalogs unreadable.
pub const BACKUP_DB_OBJECT_NAME: &str = "backup.db";
pub const BACKUP_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";

/// S3 hard limit on parts per multipart upload.
pub const S3_MAX_PART_NUMBER: u64 = 10_000;
/// Leave headroom below `S3_MAX_PART_NUMBER` so a slightly-larger-than-estimated
/// send doesn't blow the part-count ceiling mid-upload.
pub const S3_PART_NUMBER_MARGIN: u64 = 100;
pub const S3_MIN_CHUNK_SIZE: u64 = 8 * 1024 * 1024;
pub const S3_MAX_CONCURRENCY: usize = 20;

/// Minimum interval between transfer-progress log lines.
pub const TRANSFER_LOG_INTERVAL_SECS: u64 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_margin_is_smaller_than_max_parts() {
        assert!(S3_PART_NUMBER_MARGIN < S3_MAX_PART_NUMBER);
    }
}
