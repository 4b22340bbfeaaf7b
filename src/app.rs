//! Wires the store, both repositories, credentials and the sync client
//! together for a front end.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::config::Config;
use crate::storage::{CredentialStore, Credentials, LocalStore, Preferences, Repository};
use crate::sync::{ProgressFn, SyncClient};
use crate::task::{CountdownTask, DeadlineTask};
use crate::utils::paths::{ensure_memo_dir_exists, get_database_path, get_preferences_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed,
    Failed,
    /// Another upload or download was still running.
    Busy,
}

/// Clears the transfer flag when the transfer ends, however it ends.
struct TransferGuard<'a>(&'a AtomicBool);

impl Drop for TransferGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct App {
    store: Arc<LocalStore>,
    pub todos: Repository<DeadlineTask>,
    pub countdowns: Repository<CountdownTask>,
    sync: SyncClient,
    credentials: CredentialStore,
    transferring: AtomicBool,
}

impl App {
    pub async fn open(config: &Config, memo_dir: &Path) -> Result<Self> {
        ensure_memo_dir_exists(memo_dir)?;

        let store = Arc::new(LocalStore::open(get_database_path(memo_dir)).await?);
        let todos = Repository::todos(store.clone()).await?;
        let countdowns = Repository::countdowns(store.clone()).await?;

        let credentials = CredentialStore::new(Preferences::load(get_preferences_path(memo_dir))?);
        let mut sync = SyncClient::new(store.path(), &config.sync);
        if let Some(creds) = credentials.load() {
            sync.connect(&creds)?;
            debug!(url = %creds.url, "Remote backup configured");
        }

        Ok(Self {
            store,
            todos,
            countdowns,
            sync,
            credentials,
            transferring: AtomicBool::new(false),
        })
    }

    pub fn sync_client(&self) -> &SyncClient {
        &self.sync
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.load()
    }

    /// Whether sync controls should be offered at all.
    pub fn is_sync_configured(&self) -> bool {
        self.credentials.is_configured()
    }

    /// Verify the server and, if it answers, remember the credentials.
    pub async fn connect_remote(&mut self, url: &str, username: &str, password: &str) -> Result<bool> {
        if !self.sync.test_connection(url, username, password).await {
            return Ok(false);
        }
        self.credentials.save(url, username, password)?;
        info!(url, "Saved remote backup credentials");
        Ok(true)
    }

    /// Re-test the stored credentials.
    pub async fn test_remote(&mut self) -> bool {
        match self.credentials.load() {
            Some(creds) => {
                self.sync
                    .test_connection(&creds.url, &creds.username, &creds.password)
                    .await
            }
            None => false,
        }
    }

    pub fn disconnect_remote(&mut self) -> Result<()> {
        self.credentials.clear()?;
        self.sync.disconnect();
        Ok(())
    }

    fn begin_transfer(&self) -> Option<TransferGuard<'_>> {
        self.transferring
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| TransferGuard(&self.transferring))
    }

    pub fn is_transferring(&self) -> bool {
        self.transferring.load(Ordering::Acquire)
    }

    pub async fn backup(&self, progress: Option<ProgressFn>) -> SyncOutcome {
        let Some(_guard) = self.begin_transfer() else {
            debug!("Backup ignored: transfer already running");
            return SyncOutcome::Busy;
        };
        if self.sync.upload_database(progress).await {
            SyncOutcome::Completed
        } else {
            SyncOutcome::Failed
        }
    }

    /// Replace local tasks with the remote copy and reload both lists.
    ///
    /// Storage errors while reloading are returned; transfer errors are not.
    pub async fn restore(&self, progress: Option<ProgressFn>) -> Result<SyncOutcome> {
        let Some(_guard) = self.begin_transfer() else {
            debug!("Restore ignored: transfer already running");
            return Ok(SyncOutcome::Busy);
        };

        self.store.close().await;
        if !self.sync.download_database(progress).await {
            return Ok(SyncOutcome::Failed);
        }

        self.todos.reload_after_sync().await?;
        self.countdowns.reload_after_sync().await?;
        info!(
            todos = self.todos.snapshot().len(),
            countdowns = self.countdowns.snapshot().len(),
            "Restored tasks from remote backup"
        );
        Ok(SyncOutcome::Completed)
    }
}
