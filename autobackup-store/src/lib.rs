//! # autobackup-store
//!
//! SQLite-backed persistence for [`BackupRun`] records.
//!
//! One table, `backup_runs`, bootstrapped on open. Timestamps are stored as
//! RFC 3339 text. The connection sits behind a mutex; every caller in the
//! daemon touches the store from a blocking context, so no worker thread is
//! needed.

pub mod error;

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use autobackup_core::types::{BackupRun, RunId, RunStatus};

pub use error::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS backup_runs (
    id             TEXT PRIMARY KEY,
    started_at     TEXT NOT NULL,
    finished_at    TEXT,
    status         TEXT NOT NULL,
    files_changed  INTEGER NOT NULL DEFAULT 0,
    commit_hash    TEXT NOT NULL DEFAULT '',
    commit_message TEXT NOT NULL DEFAULT '',
    error_message  TEXT NOT NULL DEFAULT '',
    duration_ms    INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_backup_runs_started_at
    ON backup_runs (started_at DESC);
";

/// Handle to the run history database. Cheap to clone.
#[derive(Clone)]
pub struct RunStore {
    conn: Arc<Mutex<Connection>>,
}

impl RunStore {
    /// Open (or create) the database at `path` and bootstrap the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|source| StoreError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let conn = Connection::open(path)?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            tracing::warn!(error = %err, "failed to enable WAL mode");
        }
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// An in-memory store for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert a new run row.
    pub fn create(&self, run: &BackupRun) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO backup_runs
                (id, started_at, finished_at, status, files_changed,
                 commit_hash, commit_message, error_message, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run.id.0,
                run.started_at.to_rfc3339(),
                run.finished_at.map(|at| at.to_rfc3339()),
                run.status.as_str(),
                to_i64(run.files_changed)?,
                run.commit_hash,
                run.commit_message,
                run.error_message,
                to_i64(run.duration_ms)?,
            ],
        )?;
        Ok(())
    }

    /// Full-row update keyed by the run's identity.
    pub fn update(&self, run: &BackupRun) -> Result<(), StoreError> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE backup_runs
             SET started_at = ?2, finished_at = ?3, status = ?4,
                 files_changed = ?5, commit_hash = ?6, commit_message = ?7,
                 error_message = ?8, duration_ms = ?9
             WHERE id = ?1",
            params![
                run.id.0,
                run.started_at.to_rfc3339(),
                run.finished_at.map(|at| at.to_rfc3339()),
                run.status.as_str(),
                to_i64(run.files_changed)?,
                run.commit_hash,
                run.commit_message,
                run.error_message,
                to_i64(run.duration_ms)?,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::RunNotFound { id: run.id.clone() });
        }
        Ok(())
    }

    /// The most recently started run, if any.
    pub fn most_recent(&self) -> Result<Option<BackupRun>, StoreError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT id, started_at, finished_at, status, files_changed,
                    commit_hash, commit_message, error_message, duration_ms
             FROM backup_runs
             ORDER BY started_at DESC
             LIMIT 1",
            [],
            row_to_run,
        )
        .optional()
        .map_err(StoreError::from)?
        .transpose()
    }

    /// A page of runs, most-recent-first, plus the total row count.
    pub fn page(&self, offset: u64, limit: u64) -> Result<(Vec<BackupRun>, u64), StoreError> {
        let conn = self.lock();
        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM backup_runs", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT id, started_at, finished_at, status, files_changed,
                    commit_hash, commit_message, error_message, duration_ms
             FROM backup_runs
             ORDER BY started_at DESC
             LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![to_i64(limit)?, to_i64(offset)?], row_to_run)?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row??);
        }
        Ok((runs, total as u64))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn row_to_run(row: &Row) -> rusqlite::Result<Result<BackupRun, StoreError>> {
    let id: String = row.get("id")?;
    let started_at: String = row.get("started_at")?;
    let finished_at: Option<String> = row.get("finished_at")?;
    let status: String = row.get("status")?;
    let files_changed: i64 = row.get("files_changed")?;
    let commit_hash: String = row.get("commit_hash")?;
    let commit_message: String = row.get("commit_message")?;
    let error_message: String = row.get("error_message")?;
    let duration_ms: i64 = row.get("duration_ms")?;

    Ok(build_run(
        id,
        started_at,
        finished_at,
        status,
        files_changed,
        commit_hash,
        commit_message,
        error_message,
        duration_ms,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_run(
    id: String,
    started_at: String,
    finished_at: Option<String>,
    status: String,
    files_changed: i64,
    commit_hash: String,
    commit_message: String,
    error_message: String,
    duration_ms: i64,
) -> Result<BackupRun, StoreError> {
    Ok(BackupRun {
        id: RunId::from(id),
        started_at: parse_datetime(&started_at)?,
        finished_at: finished_at.as_deref().map(parse_datetime).transpose()?,
        status: parse_status(&status)?,
        files_changed: to_u64(files_changed)?,
        commit_hash,
        commit_message,
        error_message,
        duration_ms: to_u64(duration_ms)?,
    })
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            detail: format!("invalid datetime '{value}'"),
        })
}

fn parse_status(value: &str) -> Result<RunStatus, StoreError> {
    match value {
        "running" => Ok(RunStatus::Running),
        "success" => Ok(RunStatus::Success),
        "failed" => Ok(RunStatus::Failed),
        other => Err(StoreError::Corrupt {
            detail: format!("unknown run status '{other}'"),
        }),
    }
}

fn to_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt {
        detail: format!("value {value} exceeds SQLite INTEGER range"),
    })
}

fn to_u64(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt {
        detail: format!("value {value} is negative"),
    })
}
