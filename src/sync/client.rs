use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use super::progress::ProgressFn;
use super::webdav::WebDavClient;
use crate::config::SyncConfig;
use crate::storage::Credentials;
use crate::utils::paths::DATABASE_FILE_NAME;

/// Whole-file backup and restore of the task database.
///
/// Transfers never raise: every failure is logged and reported as `false`.
/// Callers must not run two transfers on one client at the same time, and
/// must reload their repositories after a successful download.
pub struct SyncClient {
    database_path: PathBuf,
    remote_dir: String,
    chunk_size: usize,
    remote: Option<WebDavClient>,
}

impl SyncClient {
    pub fn new(database_path: impl Into<PathBuf>, config: &SyncConfig) -> Self {
        Self {
            database_path: database_path.into(),
            remote_dir: config.remote_dir.trim_matches('/').to_string(),
            chunk_size: config.chunk_size,
            remote: None,
        }
    }

    /// Remote location of the database copy, e.g. `memo/memo.db`.
    pub fn remote_path(&self) -> String {
        let file_name = self
            .database_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DATABASE_FILE_NAME);
        format!("{}/{}", self.remote_dir, file_name)
    }

    /// Use `credentials` for later transfers without contacting the server.
    pub fn connect(&mut self, credentials: &Credentials) -> Result<()> {
        self.remote = Some(WebDavClient::new(credentials)?);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.remote = None;
    }

    pub fn is_connected(&self) -> bool {
        self.remote.is_some()
    }

    /// Probe the server and make sure the backup directory exists.
    ///
    /// On success the client keeps these credentials for later transfers.
    pub async fn test_connection(&mut self, url: &str, username: &str, password: &str) -> bool {
        let credentials = Credentials::new(url, username, password);
        match self.probe(&credentials).await {
            Ok(remote) => {
                info!(url, "WebDAV connection verified");
                self.remote = Some(remote);
                true
            }
            Err(e) => {
                warn!(url, "WebDAV connection test failed: {e:#}");
                false
            }
        }
    }

    async fn probe(&self, credentials: &Credentials) -> Result<WebDavClient> {
        let remote = WebDavClient::new(credentials)?;
        remote.ping().await?;
        if !remote.exists(&self.remote_dir).await? {
            remote.mkdir(&self.remote_dir).await?;
            info!(dir = %self.remote_dir, "Created remote backup directory");
        }
        Ok(remote)
    }

    pub async fn upload_database(&self, progress: Option<ProgressFn>) -> bool {
        match self.try_upload(progress).await {
            Ok(bytes) => {
                info!(bytes, path = %self.remote_path(), "Database uploaded");
                true
            }
            Err(e) => {
                warn!("Database upload failed: {e:#}");
                false
            }
        }
    }

    /// Replace the local database file with the remote copy.
    ///
    /// Destructive: local changes not yet uploaded are lost.
    pub async fn download_database(&self, progress: Option<ProgressFn>) -> bool {
        match self.try_download(progress).await {
            Ok(bytes) => {
                info!(bytes, path = %self.remote_path(), "Database downloaded");
                true
            }
            Err(e) => {
                warn!("Database download failed: {e:#}");
                false
            }
        }
    }

    fn remote(&self) -> Result<&WebDavClient> {
        self.remote
            .as_ref()
            .ok_or_else(|| anyhow!("remote store is not configured"))
    }

    async fn try_upload(&self, progress: Option<ProgressFn>) -> Result<u64> {
        let remote = self.remote()?;
        let data = tokio::fs::read(&self.database_path)
            .await
            .with_context(|| format!("Failed to read {:?}", self.database_path))?;
        let len = data.len() as u64;
        remote
            .write(data, &self.remote_path(), progress, self.chunk_size)
            .await?;
        Ok(len)
    }

    async fn try_download(&self, progress: Option<ProgressFn>) -> Result<u64> {
        let remote = self.remote()?;
        remote
            .read_to_file(&self.remote_path(), &self.database_path, progress)
            .await
    }
}
