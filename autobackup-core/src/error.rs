//! Error types for autobackup-core.

use thiserror::Error;

/// Errors from parsing the `WORKSPACES` configuration string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    /// A pair did not split into a non-empty `name:path` on its first colon.
    /// Carries the offending pair verbatim.
    #[error("invalid workspace format: '{pair}' (expected 'name:/path')")]
    InvalidFormat { pair: String },
}

/// Errors from assembling the daemon configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting was absent or empty.
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}
