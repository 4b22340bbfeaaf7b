use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Value;

use super::entity::{new_task_id, Completable, Identifiable, TaskEntity};
use super::record::{bool_value, get_bool, get_integer, get_text, get_timestamp, timestamp_value};
use super::span::Span;
use crate::storage::Record;

/// A task covering `[start_time, start_time + duration]`, optionally recurring.
///
/// A recurring countdown is never left completed: completing it restarts the
/// span from the current time.
#[derive(Debug, Clone, PartialEq)]
pub struct CountdownTask {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub duration: Span,
    pub is_recurring: bool,
    pub is_completed: bool,
}

impl CountdownTask {
    pub fn new(
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Span,
        is_recurring: bool,
    ) -> Self {
        Self::with_id(None, title, start_time, duration, is_recurring, false)
    }

    pub fn with_id(
        id: Option<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Span,
        is_recurring: bool,
        is_completed: bool,
    ) -> Self {
        Self {
            id: id.unwrap_or_else(new_task_id),
            title: title.into(),
            start_time,
            duration,
            is_recurring,
            is_completed,
        }
    }

    pub fn update(
        &mut self,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Span,
        is_recurring: bool,
    ) {
        self.title = title.into();
        self.start_time = start_time;
        self.duration = duration;
        self.is_recurring = is_recurring;
    }

    /// Flip completion as of `now`; see [`Completable::change_status`].
    pub fn change_status_at(&mut self, now: DateTime<Utc>) {
        self.is_completed = !self.is_completed;
        if self.is_completed && self.is_recurring {
            self.restart(now);
        }
    }

    pub fn restart(&mut self, now: DateTime<Utc>) {
        self.is_completed = false;
        self.start_time = now;
    }

    /// Start plus the span, saturating at the latest representable time.
    pub fn end_time(&self) -> DateTime<Utc> {
        Duration::try_days(self.duration.total_days())
            .and_then(|span| self.start_time.checked_add_signed(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Time until the span ends; negative once it has run out.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.end_time() - now
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time()
    }

    /// Elapsed fraction of the span, clamped to `[0, 1]`.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        let total = (self.end_time() - self.start_time).num_seconds();
        if self.duration.is_zero() || total <= 0 {
            return 1.0;
        }
        let elapsed = (now - self.start_time).num_seconds();
        (elapsed as f64 / total as f64).clamp(0.0, 1.0)
    }
}

impl Identifiable for CountdownTask {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Completable for CountdownTask {
    fn is_completed(&self) -> bool {
        self.is_completed
    }

    fn change_status(&mut self) {
        self.change_status_at(Utc::now());
    }
}

impl TaskEntity for CountdownTask {
    fn title(&self) -> &str {
        &self.title
    }

    fn to_record(&self) -> Record {
        Record::from([
            ("id".to_string(), Value::Text(self.id.clone())),
            ("title".to_string(), Value::Text(self.title.clone())),
            ("startTime".to_string(), timestamp_value(&self.start_time)),
            (
                "duration".to_string(),
                Value::Integer(self.duration.total_days()),
            ),
            ("isRecurring".to_string(), bool_value(self.is_recurring)),
            ("isCompleted".to_string(), bool_value(self.is_completed)),
        ])
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self::with_id(
            Some(get_text(record, "id")?),
            get_text(record, "title")?,
            get_timestamp(record, "startTime")?,
            Span::from_total_days(get_integer(record, "duration")?)?,
            get_bool(record, "isRecurring")?,
            get_bool(record, "isCompleted")?,
        ))
    }
}
