use anyhow::Result;
use uuid::Uuid;

use crate::storage::Record;

/// Generate a fresh opaque task id.
pub fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

pub trait Identifiable {
    fn id(&self) -> &str;
}

pub trait Completable {
    fn is_completed(&self) -> bool;

    /// Flip the completion flag, applying any kind-specific follow-up.
    fn change_status(&mut self);
}

/// A task kind that a [`Repository`](crate::storage::Repository) can own.
pub trait TaskEntity: Identifiable + Completable + Clone + Send + Sync + 'static {
    fn title(&self) -> &str;

    fn to_record(&self) -> Record;

    fn from_record(record: &Record) -> Result<Self>;
}
