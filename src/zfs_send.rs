use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

use crate::dataset_error::DatasetError;

/// A running `zfs send`, with stdout handed to the caller for streaming and
/// the child kept around so [`wait`](SendStream::wait) can reap the exit
/// status once streaming is done.
pub struct SendStream {
    child: Child,
    pub stdout: ChildStdout,
}

impl SendStream {
    /// Wraps an already-spawned child whose stdout is piped. Exposed at
    /// crate visibility so test doubles can build a real stream-backed
    /// `SendStream` from a harmless subprocess instead of `zfs send`.
    pub(crate) fn from_child(mut child: Child) -> Self {
        let stdout = child.stdout.take().expect("spawned with Stdio::piped()");
        Self { child, stdout }
    }

    /// Reaps the child. Call only after the caller is done reading
    /// `stdout` — `zfs send` may not exit until its pipe is drained.
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

/// Opens `zfs send -w <filesystem>@<name>`.
///
/// `-w` sends the raw stream, which is required so encrypted datasets can
/// be sent without the encryption key being available on this host.
pub fn zfs_open_send_stream(filesystem: &str, name: &str) -> Result<SendStream, DatasetError> {
    let child = Command::new("zfs")
        .args(["send", "-w"])
        .arg(format!("{filesystem}@{name}"))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(DatasetError::Spawn)?;
    Ok(SendStream::from_child(child))
}

/// Opens `zfs send -w -i <filesystem>@<from_name> <filesystem>@<to_name>`.
pub fn zfs_open_send_stream_inc(
    filesystem: &str,
    from_name: &str,
    to_name: &str,
) -> Result<SendStream, DatasetError> {
    let child = Command::new("zfs")
        .args(["send", "-w", "-i"])
        .arg(format!("{filesystem}@{from_name}"))
        .arg(format!("{filesystem}@{to_name}"))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(DatasetError::Spawn)?;
    Ok(SendStream::from_child(child))
}
