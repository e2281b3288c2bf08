//! Durable session records: an append-only cycle log plus one summary write.

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::models::{CycleResult, Session, Summary};

mod files;

pub use files::FileStore;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Registers a freshly started session.
    async fn open_session(&self, session: &Session) -> Result<(), PersistenceError>;

    /// Appends one cycle. Must never disturb records written earlier.
    async fn append_cycle(&self, session_id: &str, cycle: &CycleResult)
        -> Result<(), PersistenceError>;

    async fn write_summary(&self, session_id: &str, summary: &Summary)
        -> Result<(), PersistenceError>;
}
