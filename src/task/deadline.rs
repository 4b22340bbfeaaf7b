use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Value;

use super::entity::{new_task_id, Completable, Identifiable, TaskEntity};
use super::record::{bool_value, get_bool, get_text, get_timestamp, timestamp_value};
use crate::storage::Record;

/// A one-shot obligation due at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadlineTask {
    pub id: String,
    pub title: String,
    pub deadline: DateTime<Utc>,
    pub is_completed: bool,
}

impl DeadlineTask {
    pub fn new(title: impl Into<String>, deadline: DateTime<Utc>) -> Self {
        Self::with_id(None, title, deadline, false)
    }

    /// Rebuild a task with a known id, or mint one when `id` is `None`.
    pub fn with_id(
        id: Option<String>,
        title: impl Into<String>,
        deadline: DateTime<Utc>,
        is_completed: bool,
    ) -> Self {
        Self {
            id: id.unwrap_or_else(new_task_id),
            title: title.into(),
            deadline,
            is_completed,
        }
    }

    pub fn update(&mut self, title: impl Into<String>, deadline: DateTime<Utc>) {
        self.title = title.into();
        self.deadline = deadline;
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed && now > self.deadline
    }

    /// Time until the deadline; negative once it has passed.
    pub fn time_left(&self, now: DateTime<Utc>) -> Duration {
        self.deadline - now
    }
}

impl Identifiable for DeadlineTask {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Completable for DeadlineTask {
    fn is_completed(&self) -> bool {
        self.is_completed
    }

    fn change_status(&mut self) {
        self.is_completed = !self.is_completed;
    }
}

impl TaskEntity for DeadlineTask {
    fn title(&self) -> &str {
        &self.title
    }

    fn to_record(&self) -> Record {
        Record::from([
            ("id".to_string(), Value::Text(self.id.clone())),
            ("title".to_string(), Value::Text(self.title.clone())),
            ("deadline".to_string(), timestamp_value(&self.deadline)),
            ("isCompleted".to_string(), bool_value(self.is_completed)),
        ])
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self::with_id(
            Some(get_text(record, "id")?),
            get_text(record, "title")?,
            get_timestamp(record, "deadline")?,
            get_bool(record, "isCompleted")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_generates_unique_ids() {
        let deadline = Utc::now();
        let a = DeadlineTask::new("A", deadline);
        let b = DeadlineTask::new("A", deadline);
        assert_ne!(a.id, b.id);
        assert!(!a.is_completed);
    }

    #[test]
    fn test_with_known_id() {
        let task = DeadlineTask::with_id(Some("abc".to_string()), "", Utc::now(), true);
        assert_eq!(task.id, "abc");
        assert_eq!(task.title, "");
        assert!(task.is_completed);
    }

    #[test]
    fn test_change_status_is_own_inverse() {
        let deadline = Utc::now() + Duration::days(1);
        let mut task = DeadlineTask::new("Buy milk", deadline);
        let before = task.clone();

        task.change_status();
        assert!(task.is_completed);
        task.change_status();

        assert_eq!(task, before);
    }

    #[test]
    fn test_update_replaces_fields() {
        let mut task = DeadlineTask::new("Old", Utc::now());
        let id = task.id.clone();
        let deadline = Utc::now() + Duration::days(3);

        task.update("New", deadline);

        assert_eq!(task.id, id);
        assert_eq!(task.title, "New");
        assert_eq!(task.deadline, deadline);
    }

    #[test]
    fn test_record_roundtrip() {
        let mut task = DeadlineTask::new("Buy milk", Utc::now() + Duration::days(1));
        task.change_status();

        let record = task.to_record();
        assert_eq!(record.get("isCompleted"), Some(&Value::Integer(1)));

        let loaded = DeadlineTask::from_record(&record).unwrap();
        assert_eq!(loaded, task);
    }

    #[test]
    fn test_from_record_rejects_missing_deadline() {
        let mut record = DeadlineTask::new("x", Utc::now()).to_record();
        record.insert("deadline".to_string(), Value::Null);
        assert!(DeadlineTask::from_record(&record).is_err());
    }

    #[test]
    fn test_is_overdue() {
        let now = Utc::now();
        let mut task = DeadlineTask::new("Report", now - Duration::hours(1));
        assert!(task.is_overdue(now));
        assert!(task.time_left(now) < Duration::zero());

        task.change_status();
        assert!(!task.is_overdue(now));

        let future = DeadlineTask::new("Later", now + Duration::hours(1));
        assert!(!future.is_overdue(now));
    }
}
