use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Row};

use crate::classifier::ProductivityState;
use crate::db::{
    connection::{Database, DbResult},
    helpers::{parse_datetime, to_i64, to_u32},
};
use crate::models::{SessionStatus, Summary};

pub(super) fn row_to_summary(
    row: &Row,
    id_column: &str,
    started_column: &str,
    ended_column: &str,
) -> Result<Summary> {
    let started_at: String = row.get(started_column)?;
    let ended_at: String = row.get(ended_column)?;
    let mean_scores_json: String = row.get("mean_scores_json")?;
    let state: String = row.get("state")?;
    let succeeded: i64 = row.get("succeeded_cycles")?;
    let failed: i64 = row.get("failed_cycles")?;

    Ok(Summary {
        session_id: row.get(id_column)?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_datetime(&ended_at, "ended_at")?,
        duration_secs: row.get("duration_secs")?,
        mean_scores: serde_json::from_str(&mean_scores_json)
            .context("failed to parse mean_scores_json")?,
        dominant: row.get("dominant")?,
        state: ProductivityState::parse(&state),
        succeeded_cycles: to_u32(succeeded, "succeeded_cycles")?,
        failed_cycles: to_u32(failed, "failed_cycles")?,
    })
}

impl Database {
    /// Stores the summary and closes the session row in one transaction.
    pub async fn insert_summary(&self, summary: &Summary) -> DbResult<()> {
        let record = summary.clone();
        self.execute(move |conn| {
            let mean_scores_json = serde_json::to_string(&record.mean_scores)
                .context("failed to serialize mean scores")?;
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT OR REPLACE INTO session_summaries (
                    session_id, started_at, ended_at, duration_secs, mean_scores_json,
                    dominant, state, succeeded_cycles, failed_cycles
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.session_id,
                    record.started_at.to_rfc3339(),
                    record.ended_at.to_rfc3339(),
                    record.duration_secs,
                    mean_scores_json,
                    record.dominant,
                    record.state.as_str(),
                    to_i64(record.succeeded_cycles),
                    to_i64(record.failed_cycles),
                ],
            )?;

            tx.execute(
                "UPDATE sessions
                 SET status = ?1,
                     ended_at = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    SessionStatus::Completed.as_str(),
                    record.ended_at.to_rfc3339(),
                    Utc::now().to_rfc3339(),
                    record.session_id,
                ],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_summary(&self, session_id: &str) -> DbResult<Option<Summary>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, started_at, ended_at, duration_secs, mean_scores_json,
                        dominant, state, succeeded_cycles, failed_cycles
                 FROM session_summaries
                 WHERE session_id = ?1",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_summary(row, "session_id", "started_at", "ended_at")?)),
                None => Ok(None),
            }
        })
        .await
    }
}
