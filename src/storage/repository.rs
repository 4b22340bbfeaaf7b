use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::database::{Filter, LocalStore, Query, Record};
use super::schema::{COUNTDOWNS_TABLE, TODOS_TABLE};
use crate::task::{CountdownTask, DeadlineTask, TaskEntity};

pub type Deserializer<T> = fn(&Record) -> Result<T>;

/// In-memory list of one task kind, kept in step with its table.
///
/// Every mutation writes to the store first and only then touches the list,
/// so subscribers never see a state the database does not hold. Calls are
/// not serialised against each other.
pub struct Repository<T: TaskEntity> {
    store: Arc<LocalStore>,
    table: &'static str,
    deserialize: Deserializer<T>,
    items: watch::Sender<Vec<T>>,
}

impl Repository<DeadlineTask> {
    pub async fn todos(store: Arc<LocalStore>) -> Result<Self> {
        Self::create(store, TODOS_TABLE, DeadlineTask::from_record).await
    }
}

impl Repository<CountdownTask> {
    pub async fn countdowns(store: Arc<LocalStore>) -> Result<Self> {
        Self::create(store, COUNTDOWNS_TABLE, CountdownTask::from_record).await
    }
}

impl<T: TaskEntity> Repository<T> {
    /// Build the repository and wait for its initial load.
    pub async fn create(
        store: Arc<LocalStore>,
        table: &'static str,
        deserialize: Deserializer<T>,
    ) -> Result<Self> {
        let (items, _) = watch::channel(Vec::new());
        let repo = Self {
            store,
            table,
            deserialize,
            items,
        };
        repo.reload().await?;
        Ok(repo)
    }

    /// Receive the full list after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<T>> {
        self.items.subscribe()
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.items.borrow().iter().find(|t| t.id() == id).cloned()
    }

    /// Add a task. Adding an id that is already listed overwrites that task
    /// in place instead of listing it twice.
    pub async fn add(&self, entity: T) -> Result<()> {
        if self.get(entity.id()).is_some() {
            self.persist(&entity).await?;
            debug!(table = self.table, id = entity.id(), title = entity.title(), "Task replaced");
            self.replace_cached(entity);
            return Ok(());
        }
        self.store.insert(self.table, &entity.to_record()).await?;
        debug!(table = self.table, id = entity.id(), title = entity.title(), "Task added");
        self.items.send_modify(|items| items.push(entity));
        Ok(())
    }

    /// Remove by id. Unknown ids are ignored.
    pub async fn remove(&self, id: &str) -> Result<()> {
        self.store.delete(self.table, Some(&Filter::id(id))).await?;
        self.items.send_if_modified(|items| {
            let before = items.len();
            items.retain(|t| t.id() != id);
            items.len() != before
        });
        Ok(())
    }

    /// Flip completion on a cached task, persist it and return the new state.
    pub async fn toggle(&self, id: &str) -> Result<T> {
        let mut entity = self
            .get(id)
            .ok_or_else(|| anyhow!("task not found: {id}"))?;
        entity.change_status();
        self.persist(&entity).await?;
        debug!(
            table = self.table,
            id,
            completed = entity.is_completed(),
            "Task toggled"
        );
        self.replace_cached(entity.clone());
        Ok(entity)
    }

    /// Overwrite the task stored under `id` with `entity`.
    pub async fn update(&self, id: &str, entity: T) -> Result<()> {
        if entity.id() != id {
            bail!("task id mismatch: updating {id} with {}", entity.id());
        }
        if self.get(id).is_none() {
            bail!("task not found: {id}");
        }
        self.persist(&entity).await?;
        self.replace_cached(entity);
        Ok(())
    }

    /// Delete every row of this task kind.
    pub async fn clear(&self) -> Result<()> {
        let deleted = self.store.delete(self.table, None).await?;
        debug!(table = self.table, deleted, "Tasks cleared");
        self.items.send_replace(Vec::new());
        Ok(())
    }

    /// Reopen the store and rebuild the list from disk.
    ///
    /// Call after the database file has been replaced by a download.
    pub async fn reload_after_sync(&self) -> Result<()> {
        self.store.reopen().await?;
        self.reload().await
    }

    async fn reload(&self) -> Result<()> {
        let rows = self.store.query(self.table, &Query::all()).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            match (self.deserialize)(row) {
                Ok(entity) => items.push(entity),
                Err(e) => warn!(table = self.table, "Skipping unreadable row: {e:#}"),
            }
        }
        debug!(table = self.table, count = items.len(), "Tasks loaded");
        self.items.send_replace(items);
        Ok(())
    }

    /// Update in place so the row keeps its position in table order.
    async fn persist(&self, entity: &T) -> Result<()> {
        let changed = self
            .store
            .update(self.table, &entity.to_record(), &Filter::id(entity.id()))
            .await?;
        if changed == 0 {
            self.store.insert(self.table, &entity.to_record()).await?;
        }
        Ok(())
    }

    fn replace_cached(&self, entity: T) {
        self.items.send_modify(|items| {
            if let Some(slot) = items.iter_mut().find(|t| t.id() == entity.id()) {
                *slot = entity;
            }
        });
    }
}
