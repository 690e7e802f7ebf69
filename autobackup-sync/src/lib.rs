//! # autobackup-sync
//!
//! Workspace mirroring and repository versioning.
//!
//! [`mirror_workspace`] shells out to `rsync` with a fixed include set;
//! [`commit_and_push`] drives the git status/add/commit/rev-parse/push
//! pipeline; [`latest_modification`] scans a workspace for its most recent
//! content change.

pub mod error;
pub mod mirror;
pub mod scan;
pub mod versioner;

pub use error::SyncError;
pub use mirror::mirror_workspace;
pub use scan::latest_modification;
pub use versioner::{commit_and_push, VersionOutcome};
