use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::{Database, DbResult},
    helpers::{parse_datetime, parse_optional_datetime, parse_session_status},
    models::{SessionHistoryEntry, SessionRecord},
};
use crate::models::SessionStatus;

use super::summaries::row_to_summary;

fn row_to_session(row: &Row) -> Result<SessionRecord> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        status: parse_session_status(&status)?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn insert_session(&self, id: &str, started_at: DateTime<Utc>) -> DbResult<()> {
        let id = id.to_string();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO sessions (id, started_at, ended_at, status, created_at, updated_at)
                 VALUES (?1, ?2, NULL, ?3, ?4, ?4)",
                params![
                    id,
                    started_at.to_rfc3339(),
                    SessionStatus::Running.as_str(),
                    now,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> DbResult<Option<SessionRecord>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, started_at, ended_at, status, created_at, updated_at
                 FROM sessions
                 WHERE id = ?1",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_session(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn get_incomplete_sessions(&self) -> DbResult<Vec<SessionRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, started_at, ended_at, status, created_at, updated_at
                 FROM sessions
                 WHERE status = 'Running'
                 ORDER BY started_at DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    /// Closes a session left `Running` by a crash. Its logged cycles stay.
    pub async fn mark_session_interrupted(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = ?1,
                     ended_at = ?2,
                     updated_at = ?2
                 WHERE id = ?3",
                params![
                    SessionStatus::Interrupted.as_str(),
                    ended_at.to_rfc3339(),
                    session_id,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Most recent finished sessions first, each with its summary when present.
    pub async fn list_sessions(&self, limit: usize) -> DbResult<Vec<SessionHistoryEntry>> {
        let limit = limit as i64;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.started_at, s.ended_at, s.status, s.created_at, s.updated_at,
                        m.session_id AS summary_session_id,
                        m.started_at AS summary_started_at,
                        m.ended_at AS summary_ended_at,
                        m.duration_secs, m.mean_scores_json, m.dominant, m.state,
                        m.succeeded_cycles, m.failed_cycles
                 FROM sessions s
                 LEFT JOIN session_summaries m ON m.session_id = s.id
                 WHERE s.status IN ('Completed', 'Interrupted')
                 ORDER BY s.started_at DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                let has_summary = row.get::<_, Option<String>>("summary_session_id")?.is_some();
                entries.push(SessionHistoryEntry {
                    session: row_to_session(row)?,
                    summary: if has_summary {
                        Some(row_to_summary(
                            row,
                            "summary_session_id",
                            "summary_started_at",
                            "summary_ended_at",
                        )?)
                    } else {
                        None
                    },
                });
            }
            Ok(entries)
        })
        .await
    }
}
