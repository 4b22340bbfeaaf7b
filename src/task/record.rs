//! Conversions between task fields and stored column values.
//!
//! Timestamps are stored as RFC 3339 text, booleans as 0/1 integers.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use rusqlite::types::Value;

use crate::storage::Record;

pub fn timestamp_value(dt: &DateTime<Utc>) -> Value {
    Value::Text(dt.to_rfc3339())
}

pub fn bool_value(flag: bool) -> Value {
    Value::Integer(i64::from(flag))
}

/// Parse a stored timestamp. Offset-less ISO strings are read as local time.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn column<'a>(record: &'a Record, name: &str) -> Result<&'a Value> {
    record
        .get(name)
        .ok_or_else(|| anyhow!("missing column '{name}'"))
}

pub fn get_text(record: &Record, name: &str) -> Result<String> {
    match column(record, name)? {
        Value::Text(s) => Ok(s.clone()),
        other => bail!("column '{name}' is not text: {other:?}"),
    }
}

pub fn get_integer(record: &Record, name: &str) -> Result<i64> {
    match column(record, name)? {
        Value::Integer(i) => Ok(*i),
        other => bail!("column '{name}' is not an integer: {other:?}"),
    }
}

/// Reads a 0/1 flag; a NULL or absent column counts as false.
pub fn get_bool(record: &Record, name: &str) -> Result<bool> {
    match record.get(name) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Integer(i)) => Ok(*i != 0),
        Some(other) => bail!("column '{name}' is not a flag: {other:?}"),
    }
}

pub fn get_timestamp(record: &Record, name: &str) -> Result<DateTime<Utc>> {
    let text = get_text(record, name)?;
    parse_timestamp(&text).ok_or_else(|| anyhow!("column '{name}' holds an invalid timestamp: {text}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_timestamp_roundtrip_keeps_subseconds() {
        let now = Utc::now();
        let Value::Text(text) = timestamp_value(&now) else {
            panic!("timestamp should be text");
        };
        assert_eq!(parse_timestamp(&text), Some(now));
    }

    #[test]
    fn test_parse_timestamp_with_offset() {
        let dt = parse_timestamp("2025-03-01T10:00:00+02:00").unwrap();
        assert_eq!(dt.hour(), 8);
    }

    #[test]
    fn test_parse_offsetless_timestamp() {
        let dt = parse_timestamp("2025-03-01T10:00:00.123").unwrap();
        let local = dt.with_timezone(&Local);
        assert_eq!(local.hour(), 10);
        assert_eq!(local.nanosecond(), 123_000_000);
    }

    #[test]
    fn test_parse_invalid_timestamp() {
        assert!(parse_timestamp("tomorrow").is_none());
    }

    #[test]
    fn test_get_bool() {
        let mut record = Record::new();
        record.insert("a".to_string(), Value::Integer(1));
        record.insert("b".to_string(), Value::Integer(0));
        record.insert("c".to_string(), Value::Null);
        record.insert("d".to_string(), Value::Text("yes".to_string()));

        assert!(get_bool(&record, "a").unwrap());
        assert!(!get_bool(&record, "b").unwrap());
        assert!(!get_bool(&record, "c").unwrap());
        assert!(!get_bool(&record, "missing").unwrap());
        assert!(get_bool(&record, "d").is_err());
    }

    #[test]
    fn test_get_text_missing_column() {
        let record = Record::new();
        let err = get_text(&record, "title").unwrap_err();
        assert!(err.to_string().contains("missing column 'title'"));
    }
}
