use tokio::process::Command;

use crate::dataset_error::DatasetError;

/// Dry-runs `zfs send --parsable --dryrun <filesystem>@<name>` and returns
/// the byte count `zfs` reports it would send.
///
/// `--parsable` output's second line is `size\t<bytes>`.
pub async fn zfs_send_size(filesystem: &str, name: &str) -> Result<u64, DatasetError> {
    let output = Command::new("zfs")
        .args(["send", "--parsable", "--dryrun"])
        .arg(format!("{filesystem}@{name}"))
        .output()
        .await
        .map_err(DatasetError::Spawn)?;

    if !output.status.success() {
        return Err(DatasetError::CommandFailed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    parse_send_size(&String::from_utf8_lossy(&output.stdout))
}

/// Same as [`zfs_send_size`] but for an incremental stream between two
/// snapshots of the same filesystem.
pub async fn zfs_send_size_inc(
    filesystem: &str,
    from_name: &str,
    to_name: &str,
) -> Result<u64, DatasetError> {
    let output = Command::new("zfs")
        .args(["send", "--parsable", "--dryrun", "-i"])
        .arg(format!("{filesystem}@{from_name}"))
        .arg(format!("{filesystem}@{to_name}"))
        .output()
        .await
        .map_err(DatasetError::Spawn)?;

    if !output.status.success() {
        return Err(DatasetError::CommandFailed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    parse_send_size(&String::from_utf8_lossy(&output.stdout))
}

fn parse_send_size(stdout: &str) -> Result<u64, DatasetError> {
    let size_line = stdout
        .lines()
        .nth(1)
        .ok_or_else(|| DatasetError::UnparseableOutput(stdout.to_string()))?;
    let size_str = size_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| DatasetError::UnparseableOutput(stdout.to_string()))?;
    size_str
        .parse()
        .map_err(|_| DatasetError::UnparseableOutput(stdout.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_line() {
        let stdout = "full\tpool/data@snap1\nsize\t123456\n";
        assert_eq!(parse_send_size(stdout).unwrap(), 123456);
    }

    #[test]
    fn rejects_short_output() {
        assert!(parse_send_size("full\tpool/data@snap1\n").is_err());
    }
}
