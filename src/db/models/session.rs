//! Row-level session models as stored in SQLite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{SessionStatus, Summary};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A past session with its summary, if one was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistoryEntry {
    pub session: SessionRecord,
    pub summary: Option<Summary>,
}
