//! Error types for autobackup-sync.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// All errors that can arise from mirroring and versioning operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The external tool could not be launched at all (missing binary,
    /// permission denied, ...).
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// `rsync` exited non-zero; carries its combined stdout/stderr. The
    /// destination is left in whatever partial state the transfer produced.
    #[error("rsync {src} -> {dst} failed ({status}): {output}")]
    SyncFailed {
        src: PathBuf,
        dst: PathBuf,
        status: ExitStatus,
        output: String,
    },

    /// A git stage failed; the remaining stages were not attempted. A commit
    /// that exists locally when the push stage fails is not rolled back.
    #[error("git {stage} failed ({status}): {output}")]
    VersioningFailed {
        stage: &'static str,
        status: ExitStatus,
        output: String,
    },

    /// No push key configured — checked before any git state is touched.
    #[error("SSH_KEY_PATH not configured; refusing to push")]
    MissingSshKey,

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
