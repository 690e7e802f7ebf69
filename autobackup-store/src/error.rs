//! Error types for autobackup-store.

use std::path::PathBuf;

use thiserror::Error;

use autobackup_core::types::RunId;

/// All errors that can arise from run-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Could not create the database's parent directory.
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An `update` targeted an id with no row.
    #[error("no persisted run with id {id}")]
    RunNotFound { id: RunId },

    /// A stored row failed to map back into a [`autobackup_core::BackupRun`].
    #[error("corrupt run row: {detail}")]
    Corrupt { detail: String },
}
