use std::process::ExitStatus;

/// Surfaced whenever the local dataset tool (`zfs`) exits non-zero or its
/// stdout can't be parsed the way we expect.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to spawn dataset command: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to wait on dataset command: {0}")]
    Wait(#[source] std::io::Error),
    #[error("dataset command exited with {status}: {stderr}")]
    CommandFailed { status: ExitStatus, stderr: String },
    #[error("could not parse dataset command output: {0}")]
    UnparseableOutput(String),
}
