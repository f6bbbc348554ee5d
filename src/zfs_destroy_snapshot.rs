use tokio::process::Command;

use crate::dataset_error::DatasetError;

/// `zfs destroy <filesystem>@<name>`
pub async fn zfs_destroy_snapshot(filesystem: &str, name: &str) -> Result<(), DatasetError> {
    let output = Command::new("zfs")
        .arg("destroy")
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
