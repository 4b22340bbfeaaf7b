use anyhow::{anyhow, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that relocates the whole data directory.
pub const MEMO_HOME_ENV: &str = "MEMO_HOME";

/// File name of the task database, both locally and on the remote store.
pub const DATABASE_FILE_NAME: &str = "memo.db";

pub fn get_memo_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(MEMO_HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
    Ok(home.join(".memo"))
}

pub fn get_config_path(memo_dir: &Path) -> PathBuf {
    memo_dir.join("config.toml")
}

pub fn get_database_path(memo_dir: &Path) -> PathBuf {
    memo_dir.join(DATABASE_FILE_NAME)
}

pub fn get_preferences_path(memo_dir: &Path) -> PathBuf {
    memo_dir.join("preferences.toml")
}

pub fn get_logs_dir(memo_dir: &Path) -> PathBuf {
    memo_dir.join("logs")
}

pub fn get_crash_log_path(memo_dir: &Path) -> PathBuf {
    memo_dir.join("crash.log")
}

pub fn ensure_memo_dir_exists(memo_dir: &Path) -> Result<()> {
    if !memo_dir.exists() {
        fs::create_dir_all(memo_dir)?;
    }
    Ok(())
}
