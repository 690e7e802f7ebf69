//! Workspace mirroring via `rsync`.
//!
//! The include set is fixed, not configurable: top-level `*.md` files plus
//! the full `memory/`, `skills/`, `.openclaw/` and `canvas/` subtrees.
//! Everything else is excluded, and destination entries that fell out of the
//! source are removed by `--delete`.

use std::path::Path;
use std::process::Command;

use crate::error::SyncError;

/// Subdirectories mirrored in full when present at the source.
pub const SYNCED_DIRS: [&str; 4] = ["memory", "skills", ".openclaw", "canvas"];

/// Mirror the backed-up subset of `src` into `dst`.
///
/// Idempotent: a second run over an unchanged source leaves the destination
/// byte-identical. On a non-zero rsync exit the destination keeps whatever
/// partial state the transfer produced; there is no rollback.
pub fn mirror_workspace(src: &Path, dst: &Path) -> Result<(), SyncError> {
    let mut cmd = Command::new("rsync");
    cmd.arg("-a").arg("--delete").arg("--include=*.md");
    for dir in SYNCED_DIRS {
        cmd.arg(format!("--include={dir}/"));
        cmd.arg(format!("--include={dir}/**"));
    }
    cmd.arg("--exclude=*");
    // Trailing slashes: copy contents-of-src into dst, not src itself.
    cmd.arg(format!("{}/", src.display()));
    cmd.arg(format!("{}/", dst.display()));

    let output = cmd.output().map_err(|source| SyncError::Spawn {
        tool: "rsync",
        source,
    })?;

    if !output.status.success() {
        return Err(SyncError::SyncFailed {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            status: output.status,
            output: combined_output(&output),
        });
    }

    tracing::debug!(src = %src.display(), dst = %dst.display(), "workspace mirrored");
    Ok(())
}

pub(crate) fn combined_output(output: &std::process::Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.trim().is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim_end());
    }
    text.trim().to_owned()
}
