use tokio::process::Command;

use crate::dataset_error::DatasetError;

/// `zfs rollback <filesystem>@<snapshot_name>` — discards everything written
/// after the snapshot.
pub async fn zfs_rollback_filesystem(
    filesystem: &str,
    snapshot_name: &str,
) -> Result<(), DatasetError> {
    let output = Command::new("zfs")
        .arg("rollback")
        .arg(format!("{filesystem}@{snapshot_name}"))
        .output()
        .await
        .map_err(DatasetError::Spawn)?;

    if !output.status.success() {
        return Err(DatasetError::CommandFailed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}
