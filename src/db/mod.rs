mod connection;
mod helpers;
mod migrations;
pub mod models;
mod repositories;
mod store;

pub use connection::{Database, DbError, DbResult};
pub use models::{SessionHistoryEntry, SessionRecord};
