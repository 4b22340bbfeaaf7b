pub const TODOS_TABLE: &str = "todos";
pub const COUNTDOWNS_TABLE: &str = "countdowns";

/// Table definitions, applied on every open. Each statement is idempotent.
pub const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS todos (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        deadline TEXT,
        isCompleted INTEGER DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS countdowns (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        startTime TEXT NOT NULL,
        duration INTEGER NOT NULL,
        isRecurring INTEGER DEFAULT 0,
        isCompleted INTEGER DEFAULT 0
    )",
];
