use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdin, Command};

use crate::dataset_error::DatasetError;

/// A running `zfs receive`, with stdin handed to the caller for streaming
/// into and the child kept around so [`wait`](ReceiveStream::wait) can reap
/// the exit status once streaming is done.
pub struct ReceiveStream {
    child: Child,
    pub stdin: ChildStdin,
}

impl ReceiveStream {
    /// Wraps an already-spawned child whose stdin is piped. Exposed at
    /// crate visibility so test doubles can build a real stream-backed
    /// `ReceiveStream` from a harmless subprocess instead of `zfs receive`.
    pub(crate) fn from_child(mut child: Child) -> Self {
        let stdin = child.stdin.take().expect("spawned with Stdio::piped()");
        Self { child, stdin }
    }

    /// Reaps the child. The caller should drop/close `stdin` first so
    /// `zfs receive` sees EOF.
    pub async fn wait(&mut self) -> Result<(), DatasetError> {
        let status = self.child.wait().await.map_err(DatasetError::Wait)?;
        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut stderr_pipe) = self.child.stderr.take() {
                let _ = stderr_pipe.read_to_string(&mut stderr).await;
            }
            return Err(DatasetError::CommandFailed { status, stderr });
        }
        Ok(())
    }
}

/// Opens `zfs receive <filesystem>@<name>`.
///
/// Reconciliation of the local dataset state (destroying snapshots newer
/// than the restore target, rolling back or destroying the filesystem) must
/// happen before this is called — see the Job Engine's restore procedure.
/// No `-F` is passed: the caller is expected to have already reconciled the
/// target so an implicit rollback is never required, which keeps this safe
/// to use against encrypted targets too.
pub fn zfs_open_receive_stream(
    filesystem: &str,
    name: &str,
) -> Result<ReceiveStream, DatasetError> {
    let mut child = Command::new("zfs")
        .arg("receive")
        .arg(format!("{filesystem}@{name}"))
        .stdin(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(DatasetError::Spawn)?;
    Ok(ReceiveStream::from_child(child))
}
