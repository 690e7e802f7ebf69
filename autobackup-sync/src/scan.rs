//! Workspace modification scanning for status reporting.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::error::{io_err, SyncError};

/// How deep below the workspace root the scan looks. Workspaces keep their
/// interesting content at the top two levels; going deeper only burns I/O.
const MAX_DEPTH: usize = 2;

/// Most recent content modification time observed under `path`, or `None`
/// when the workspace directory does not exist.
pub fn latest_modification(path: &Path) -> Result<Option<DateTime<Utc>>, SyncError> {
    if !path.exists() {
        return Ok(None);
    }

    let mut latest: Option<SystemTime> = None;
    let mut stack = vec![(path.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = stack.pop() {
        let meta = fs::metadata(&dir).map_err(|e| io_err(&dir, e))?;
        observe(&mut latest, meta.modified().map_err(|e| io_err(&dir, e))?);

        if depth >= MAX_DEPTH || !meta.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            let entry_path = entry.path();
            let file_type = entry.file_type().map_err(|e| io_err(&entry_path, e))?;
            if file_type.is_dir() {
                stack.push((entry_path, depth + 1));
            } else if file_type.is_file() {
                let meta = entry.metadata().map_err(|e| io_err(&entry_path, e))?;
                observe(&mut latest, meta.modified().map_err(|e| io_err(&entry_path, e))?);
            }
        }
    }

    Ok(latest.map(DateTime::<Utc>::from))
}

fn observe(latest: &mut Option<SystemTime>, seen: SystemTime) {
    match latest {
        Some(current) if *current >= seen => {}
        _ => *latest = Some(seen),
    }
}
