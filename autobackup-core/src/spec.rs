//! `WORKSPACES` spec string parsing.
//!
//! Format: `name1:/path1,name2:/path2`. Each pair splits on its FIRST colon
//! so paths containing colons survive intact. The resulting `BTreeMap` gives
//! the stable iteration order the sync pipeline relies on.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::SpecError;
use crate::types::WorkspaceName;

/// Name → absolute source path, ordered by name.
pub type WorkspaceMap = BTreeMap<WorkspaceName, PathBuf>;

/// Parse a workspace spec string into a name → path map.
///
/// An empty input yields an empty map, not an error. Whitespace around names
/// and paths is trimmed. Pure function; no filesystem access.
pub fn parse_workspaces(raw: &str) -> Result<WorkspaceMap, SpecError> {
    let mut workspaces = WorkspaceMap::new();
    if raw.is_empty() {
        return Ok(workspaces);
    }

    for pair in raw.split(',') {
        let trimmed = pair.trim();
        let (name, path) = trimmed.split_once(':').ok_or_else(|| invalid(pair))?;
        let name = name.trim();
        let path = path.trim();
        if name.is_empty() || path.is_empty() {
            return Err(invalid(pair));
        }
        workspaces.insert(WorkspaceName::from(name), PathBuf::from(path));
    }

    Ok(workspaces)
}

fn invalid(pair: &str) -> SpecError {
    SpecError::InvalidFormat {
        pair: pair.to_owned(),
    }
}
