pub mod credentials;
pub mod database;
pub mod preferences;
pub mod repository;
pub mod schema;

pub use credentials::{CredentialStore, Credentials};
pub use database::{Filter, LocalStore, Query, Record};
pub use preferences::Preferences;
pub use repository::Repository;
pub use schema::{COUNTDOWNS_TABLE, TODOS_TABLE};
