use anyhow::{anyhow, bail, Context, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::schema::SCHEMA;

/// One row, keyed by column name.
pub type Record = BTreeMap<String, Value>;

/// A WHERE clause with `?` placeholders and the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub clause: String,
    pub args: Vec<Value>,
}

impl Filter {
    pub fn new(clause: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            clause: clause.into(),
            args,
        }
    }

    pub fn eq(column: &str, value: Value) -> Self {
        Self::new(format!("{column} = ?"), vec![value])
    }

    pub fn id(id: &str) -> Self {
        Self::eq("id", Value::Text(id.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub columns: Option<Vec<String>>,
    pub filter: Option<Filter>,
    pub order_by: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn to_sql(&self, table: &str) -> Result<String> {
        let columns = match &self.columns {
            Some(columns) => {
                for column in columns {
                    check_identifier(column)?;
                }
                columns.join(", ")
            }
            None => "*".to_string(),
        };

        let mut sql = format!("SELECT {columns} FROM {table}");
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.clause);
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
        Ok(sql)
    }
}

/// Table and column names are interpolated into SQL, so only plain
/// identifiers are accepted.
fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("Invalid SQL identifier: {name:?}");
    }
    Ok(())
}

fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {parent:?}"))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {path:?}"))?;

    for statement in SCHEMA {
        conn.execute(statement, [])?;
    }

    debug!(path = %path.display(), "Opened task database");
    Ok(conn)
}

/// The single task database file and its open handle.
///
/// Every operation opens the handle on demand, so [`close`](Self::close)
/// only releases it until the next call. Errors from SQLite propagate
/// unchanged apart from added context.
pub struct LocalStore {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl LocalStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            conn: Mutex::new(None),
        };
        {
            let mut slot = store.conn.lock().await;
            store.connect(&mut slot)?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn is_open(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    fn connect<'a>(&self, slot: &'a mut Option<Connection>) -> Result<&'a Connection> {
        if slot.is_none() {
            *slot = Some(open_connection(&self.path)?);
        }
        slot.as_ref()
            .ok_or_else(|| anyhow!("Database connection unavailable"))
    }

    /// Insert a row, replacing any existing row with the same primary key.
    pub async fn insert(&self, table: &str, record: &Record) -> Result<()> {
        check_identifier(table)?;
        if record.is_empty() {
            bail!("Cannot insert an empty row into {table}");
        }
        for column in record.keys() {
            check_identifier(column)?;
        }

        let columns: Vec<&str> = record.keys().map(String::as_str).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT OR REPLACE INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );

        let mut slot = self.conn.lock().await;
        let conn = self.connect(&mut slot)?;
        conn.execute(&sql, params_from_iter(record.values()))
            .with_context(|| format!("Failed to insert into {table}"))?;
        Ok(())
    }

    pub async fn query(&self, table: &str, query: &Query) -> Result<Vec<Record>> {
        check_identifier(table)?;
        let sql = query.to_sql(table)?;
        let args: &[Value] = match &query.filter {
            Some(filter) => &filter.args,
            None => &[],
        };

        let mut slot = self.conn.lock().await;
        let conn = self.connect(&mut slot)?;
        let mut stmt = conn
            .prepare(&sql)
            .with_context(|| format!("Failed to prepare query on {table}"))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            let mut record = Record::new();
            for (idx, name) in names.iter().enumerate() {
                record.insert(name.clone(), row.get::<_, Value>(idx)?);
            }
            Ok(record)
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Set `values` on every row matching `filter`. Returns the affected count.
    pub async fn update(&self, table: &str, values: &Record, filter: &Filter) -> Result<usize> {
        check_identifier(table)?;
        if values.is_empty() {
            return Ok(0);
        }
        let mut sets = Vec::with_capacity(values.len());
        for column in values.keys() {
            check_identifier(column)?;
            sets.push(format!("{column} = ?"));
        }
        let sql = format!(
            "UPDATE {table} SET {} WHERE {}",
            sets.join(", "),
            filter.clause
        );

        let mut slot = self.conn.lock().await;
        let conn = self.connect(&mut slot)?;
        let changed = conn
            .execute(&sql, params_from_iter(values.values().chain(filter.args.iter())))
            .with_context(|| format!("Failed to update {table}"))?;
        Ok(changed)
    }

    /// Delete rows matching `filter`, or every row when `filter` is `None`.
    pub async fn delete(&self, table: &str, filter: Option<&Filter>) -> Result<usize> {
        check_identifier(table)?;
        let (sql, args) = match filter {
            Some(filter) => (
                format!("DELETE FROM {table} WHERE {}", filter.clause),
                filter.args.as_slice(),
            ),
            None => (format!("DELETE FROM {table}"), &[][..]),
        };

        let mut slot = self.conn.lock().await;
        let conn = self.connect(&mut slot)?;
        let deleted = conn
            .execute(&sql, params_from_iter(args.iter()))
            .with_context(|| format!("Failed to delete from {table}"))?;
        Ok(deleted)
    }

    /// Drop the current handle and open a fresh one on the same path.
    ///
    /// Needed after the file has been replaced on disk; the old handle would
    /// keep serving the replaced file's contents.
    pub async fn reopen(&self) -> Result<()> {
        let mut slot = self.conn.lock().await;
        close_slot(&mut slot);
        self.connect(&mut slot)?;
        info!(path = %self.path.display(), "Reopened task database");
        Ok(())
    }

    pub async fn close(&self) {
        let mut slot = self.conn.lock().await;
        close_slot(&mut slot);
    }
}

fn close_slot(slot: &mut Option<Connection>) {
    if let Some(conn) = slot.take()
        && let Err((_, e)) = conn.close()
    {
        warn!(error = %e, "Failed to close database cleanly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{COUNTDOWNS_TABLE, TODOS_TABLE};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn setup_test_store() -> (TempDir, LocalStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::open(temp_dir.path().join("memo.db"))
            .await
            .unwrap();
        (temp_dir, store)
    }

    fn todo_record(id: &str, title: &str, completed: bool) -> Record {
        Record::from([
            ("id".to_string(), Value::Text(id.to_string())),
            ("title".to_string(), Value::Text(title.to_string())),
            (
                "deadline".to_string(),
                Value::Text("2026-01-15T09:00:00+00:00".to_string()),
            ),
            ("isCompleted".to_string(), Value::Integer(i64::from(completed))),
        ])
    }

    fn text(record: &Record, column: &str) -> String {
        match record.get(column) {
            Some(Value::Text(s)) => s.clone(),
            other => panic!("expected text in {column}, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_database_schema() {
        let (_temp_dir, store) = setup_test_store().await;

        let tables = store
            .query(
                "sqlite_master",
                &Query::all()
                    .columns(&["name"])
                    .filter(Filter::eq("type", Value::Text("table".to_string()))),
            )
            .await
            .unwrap();
        let names: Vec<String> = tables.iter().map(|r| text(r, "name")).collect();

        assert!(names.contains(&TODOS_TABLE.to_string()));
        assert!(names.contains(&COUNTDOWNS_TABLE.to_string()));
    }

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let (temp_dir, store) = setup_test_store().await;
        store.insert(TODOS_TABLE, &todo_record("a", "Keep me", false)).await.unwrap();
        drop(store);

        let store = LocalStore::open(temp_dir.path().join("memo.db")).await.unwrap();
        let rows = store.query(TODOS_TABLE, &Query::all()).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_then_query_returns_row() {
        let (_temp_dir, store) = setup_test_store().await;
        let record = todo_record("a", "Buy milk", false);

        store.insert(TODOS_TABLE, &record).await.unwrap();
        let rows = store
            .query(TODOS_TABLE, &Query::all().filter(Filter::id("a")))
            .await
            .unwrap();

        assert_eq!(rows, vec![record]);
    }

    #[tokio::test]
    async fn test_insert_replaces_on_conflict() {
        let (_temp_dir, store) = setup_test_store().await;
        store.insert(TODOS_TABLE, &todo_record("a", "First", false)).await.unwrap();

        let mut partial = Record::new();
        partial.insert("id".to_string(), Value::Text("a".to_string()));
        partial.insert("title".to_string(), Value::Text("Second".to_string()));
        store.insert(TODOS_TABLE, &partial).await.unwrap();

        let rows = store.query(TODOS_TABLE, &Query::all()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(text(&rows[0], "title"), "Second");
        // Replaced wholesale, not merged: the deadline is gone.
        assert_eq!(rows[0].get("deadline"), Some(&Value::Null));
        assert_eq!(rows[0].get("isCompleted"), Some(&Value::Integer(0)));
    }

    #[tokio::test]
    async fn test_query_projection_order_and_paging() {
        let (_temp_dir, store) = setup_test_store().await;
        for (id, title) in [("a", "Charlie"), ("b", "Alpha"), ("c", "Bravo")] {
            store.insert(TODOS_TABLE, &todo_record(id, title, false)).await.unwrap();
        }

        let rows = store
            .query(
                TODOS_TABLE,
                &Query::all().columns(&["title"]).order_by("title ASC"),
            )
            .await
            .unwrap();
        let titles: Vec<String> = rows.iter().map(|r| text(r, "title")).collect();
        assert_eq!(titles, vec!["Alpha", "Bravo", "Charlie"]);
        assert_eq!(rows[0].len(), 1);

        let page = store
            .query(TODOS_TABLE, &Query::all().order_by("title").limit(1).offset(1))
            .await
            .unwrap();
        assert_eq!(text(&page[0], "title"), "Bravo");

        let tail = store
            .query(TODOS_TABLE, &Query::all().order_by("title").offset(2))
            .await
            .unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(text(&tail[0], "title"), "Charlie");
    }

    #[tokio::test]
    async fn test_query_with_bound_predicate() {
        let (_temp_dir, store) = setup_test_store().await;
        store.insert(TODOS_TABLE, &todo_record("a", "Done", true)).await.unwrap();
        store.insert(TODOS_TABLE, &todo_record("b", "Open", false)).await.unwrap();

        let rows = store
            .query(
                TODOS_TABLE,
                &Query::all().filter(Filter::new(
                    "isCompleted = ? AND title LIKE ?",
                    vec![Value::Integer(0), Value::Text("O%".to_string())],
                )),
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(text(&rows[0], "id"), "b");
    }

    #[tokio::test]
    async fn test_update_returns_affected_count() {
        let (_temp_dir, store) = setup_test_store().await;
        store.insert(TODOS_TABLE, &todo_record("a", "A", false)).await.unwrap();
        store.insert(TODOS_TABLE, &todo_record("b", "B", false)).await.unwrap();

        let values = Record::from([("isCompleted".to_string(), Value::Integer(1))]);
        let changed = store.update(TODOS_TABLE, &values, &Filter::id("a")).await.unwrap();
        assert_eq!(changed, 1);

        let missing = store.update(TODOS_TABLE, &values, &Filter::id("zzz")).await.unwrap();
        assert_eq!(missing, 0);

        let rows = store
            .query(TODOS_TABLE, &Query::all().filter(Filter::id("a")))
            .await
            .unwrap();
        assert_eq!(rows[0].get("isCompleted"), Some(&Value::Integer(1)));
    }

    #[tokio::test]
    async fn test_delete_with_and_without_filter() {
        let (_temp_dir, store) = setup_test_store().await;
        for id in ["a", "b", "c"] {
            store.insert(TODOS_TABLE, &todo_record(id, id, false)).await.unwrap();
        }

        assert_eq!(store.delete(TODOS_TABLE, Some(&Filter::id("a"))).await.unwrap(), 1);
        assert_eq!(store.delete(TODOS_TABLE, Some(&Filter::id("a"))).await.unwrap(), 0);
        assert_eq!(store.delete(TODOS_TABLE, None).await.unwrap(), 2);

        let rows = store.query(TODOS_TABLE, &Query::all()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_close_then_access_reopens() {
        let (_temp_dir, store) = setup_test_store().await;
        store.insert(TODOS_TABLE, &todo_record("a", "A", false)).await.unwrap();

        store.close().await;
        assert!(!store.is_open().await);

        let rows = store.query(TODOS_TABLE, &Query::all()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(store.is_open().await);
    }

    #[tokio::test]
    async fn test_reopen_is_safe_when_open_or_closed() {
        let (_temp_dir, store) = setup_test_store().await;
        store.reopen().await.unwrap();
        store.reopen().await.unwrap();
        store.close().await;
        store.reopen().await.unwrap();
        assert!(store.is_open().await);
    }

    #[tokio::test]
    async fn test_reopen_observes_replaced_file() {
        let (temp_dir, store) = setup_test_store().await;
        store.insert(TODOS_TABLE, &todo_record("old", "Old", false)).await.unwrap();

        let other_path = temp_dir.path().join("other.db");
        let other = LocalStore::open(&other_path).await.unwrap();
        other.insert(TODOS_TABLE, &todo_record("new", "New", false)).await.unwrap();
        other.close().await;

        let staged = temp_dir.path().join("memo.db.download");
        fs::copy(&other_path, &staged).unwrap();
        fs::rename(&staged, store.path()).unwrap();
        store.reopen().await.unwrap();

        let rows = store.query(TODOS_TABLE, &Query::all()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(text(&rows[0], "id"), "new");
    }

    #[tokio::test]
    async fn test_invalid_identifiers_rejected() {
        let (_temp_dir, store) = setup_test_store().await;
        assert!(store.query("todos; DROP TABLE todos", &Query::all()).await.is_err());

        let mut record = todo_record("a", "A", false);
        record.insert("bad column".to_string(), Value::Null);
        assert!(store.insert(TODOS_TABLE, &record).await.is_err());
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let (_temp_dir, store) = setup_test_store().await;
        let err = store.query("no_such_table", &Query::all()).await.unwrap_err();
        assert!(err.to_string().contains("no_such_table"));
    }

    #[test]
    fn test_check_identifier() {
        assert!(check_identifier("isCompleted").is_ok());
        assert!(check_identifier("_private").is_ok());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("1abc").is_err());
        assert!(check_identifier("a-b").is_err());
    }
}
