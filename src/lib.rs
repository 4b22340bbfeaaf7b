//! Deadline todos and recurring countdowns kept in a local SQLite file,
//! with whole-file backup and restore over WebDAV.

pub mod app;
pub mod config;
pub mod storage;
pub mod sync;
pub mod task;
pub mod utils;
