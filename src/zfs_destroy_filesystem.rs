use tokio::process::Command;

use crate::dataset_error::DatasetError;

/// `zfs destroy -r <filesystem>` — recursive, also removes all of the
/// filesystem's snapshots.
pub async fn zfs_destroy_filesystem(filesystem: &str) -> Result<(), DatasetError> {
    let output = Command::new("zfs")
        .args(["destroy", "-r"])
        .arg(filesystem)
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
