use tokio::process::Command;

use crate::dataset_error::DatasetError;

/// `zfs snapshot <filesystem>@<name>`
pub async fn zfs_create_snapshot(filesystem: &str, name: &str) -> Result<(), DatasetError> {
    let output = Command::new("zfs")
        .arg("snapshot")
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
    Ok(())
}
