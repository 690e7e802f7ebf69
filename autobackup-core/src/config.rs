//! Daemon configuration, read once from the environment at startup.
//!
//! The struct itself is plain data so tests can construct it directly;
//! only [`Config::from_env`] touches `std::env`.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// String-valued settings for one daemon process.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Workspace spec string, `name1:/path1,name2:/path2`.
    pub workspaces: String,
    /// Root of the git-versioned backup repository.
    pub backup_repo: PathBuf,
    /// Private key used for the push transport; push is refused without it.
    pub ssh_key_path: Option<PathBuf>,
    /// SQLite database path.
    pub database_path: PathBuf,
    /// Unix socket the daemon listens on.
    pub socket_path: PathBuf,
    /// Telegram credentials — both required for delivery, otherwise
    /// notifications are skipped.
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Config {
    /// Load settings from the environment, applying the same defaults the
    /// service has always shipped with.
    pub fn from_env() -> Self {
        let database_path =
            PathBuf::from(env_or("DATABASE_URL", "./data/backup.db"));
        let socket_path = env::var("AUTOBACKUP_SOCKET")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default_socket_path(&database_path));

        Self {
            workspaces: env_or("WORKSPACES", ""),
            backup_repo: PathBuf::from(env_or("BACKUP_REPO", "")),
            ssh_key_path: env_opt("SSH_KEY_PATH").map(PathBuf::from),
            database_path,
            socket_path,
            telegram_bot_token: env_opt("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: env_opt("TELEGRAM_CHAT_ID"),
        }
    }

    /// Check the settings every backup run depends on. Runs call this
    /// before touching the mirror or the repository, so a blank
    /// `BACKUP_REPO` fails with a named setting instead of surfacing as
    /// an rsync or git error halfway through.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backup_repo.as_os_str().is_empty() {
            return Err(ConfigError::Missing("BACKUP_REPO"));
        }
        Ok(())
    }

    /// True when both Telegram credentials are present.
    pub fn telegram_configured(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }
}

/// The socket lives next to the database by default.
fn default_socket_path(database_path: &Path) -> PathBuf {
    match database_path.parent() {
        Some(dir) if dir.as_os_str().is_empty() => PathBuf::from("autobackup.sock"),
        Some(dir) => dir.join("autobackup.sock"),
        None => PathBuf::from("autobackup.sock"),
    }
}

fn env_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_owned(),
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}
