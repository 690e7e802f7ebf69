//! Autobackup core library — domain types, workspace spec parsing, config.
//!
//! Public API surface:
//! - [`types`] — newtypes and the [`BackupRun`] record
//! - [`spec`] — `WORKSPACES` string parsing
//! - [`config`] — environment-backed settings
//! - [`error`] — [`SpecError`] and [`ConfigError`]

pub mod config;
pub mod error;
pub mod spec;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, SpecError};
pub use spec::{parse_workspaces, WorkspaceMap};
pub use types::{BackupRun, RunId, RunStatus, WorkspaceName};
