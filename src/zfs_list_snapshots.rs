use std::collections::HashMap;

use tokio::process::Command;

use crate::dataset_error::DatasetError;

/// One row of `zfs list -p -t snapshot`: whatever columns the caller asked
/// for, in bytes (`-p`).
pub type RawSnapshotRow = HashMap<String, String>;

/// Lists every snapshot on the host, keyed by `dataset@name`.
///
/// `-p` keeps size columns in raw bytes instead of human units so callers
/// don't have to re-parse `1.2G`-style strings.
pub async fn zfs_list_snapshots() -> Result<HashMap<String, RawSnapshotRow>, DatasetError> {
    let output = Command::new("zfs")
        .args(["list", "-p", "-t", "snapshot"])
        .output()
        .await
        .map_err(DatasetError::Spawn)?;

    if !output.status.success() {
        return Err(DatasetError::CommandFailed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();

    let Some(header_line) = lines.next() else {
        return Ok(HashMap::new());
    };
    let header: Vec<&str> = header_line.split_whitespace().collect();

    let mut snapshots = HashMap::new();
    for line in lines {
        let columns: Vec<&str> = line.split_whitespace().collect();
        let Some(name) = columns.first() else {
            continue;
        };
        let row = header[1..]
            .iter()
            .zip(columns[1..].iter())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        snapshots.insert(name.to_string(), row);
    }

    Ok(snapshots)
}
