use tokio::process::Command;

use crate::dataset_error::DatasetError;

/// `zfs create <filesystem>` — used when restoring to a `filesystem`
/// override that doesn't exist yet.
pub async fn zfs_create_filesystem(filesystem: &str) -> Result<(), DatasetError> {
    let output = Command::new("zfs")
        .arg("create")
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
