use anyhow::Context;
use rusqlite::params;

use crate::db::{
    connection::{Database, DbResult},
    helpers::{parse_cycle_status, parse_datetime},
};
use crate::classifier::{Classification, ProductivityState};
use crate::models::{CycleResult, EmotionScores};

impl Database {
    pub async fn insert_cycle(&self, session_id: &str, cycle: &CycleResult) -> DbResult<()> {
        let session_id = session_id.to_string();
        let record = cycle.clone();
        self.execute(move |conn| {
            let scores_json =
                serde_json::to_string(&record.scores).context("failed to serialize scores")?;
            let dominant = record
                .classification
                .as_ref()
                .and_then(|c| c.dominant.clone());
            let state = record.classification.as_ref().map(|c| c.state.as_str());

            conn.execute(
                "INSERT INTO cycle_results
                     (session_id, timestamp, status, scores_json, dominant, state)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session_id,
                    record.timestamp.to_rfc3339(),
                    record.status.as_str(),
                    scores_json,
                    dominant,
                    state,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Cycles in the order they were appended.
    pub async fn get_cycles_for_session(&self, session_id: &str) -> DbResult<Vec<CycleResult>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT timestamp, status, scores_json, dominant, state
                 FROM cycle_results
                 WHERE session_id = ?1
                 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let mut cycles = Vec::new();
            while let Some(row) = rows.next()? {
                let timestamp: String = row.get(0)?;
                let status: String = row.get(1)?;
                let scores_json: String = row.get(2)?;
                let dominant: Option<String> = row.get(3)?;
                let state: Option<String> = row.get(4)?;

                let scores: EmotionScores =
                    serde_json::from_str(&scores_json).context("failed to parse scores_json")?;

                cycles.push(CycleResult {
                    timestamp: parse_datetime(&timestamp, "timestamp")?,
                    status: parse_cycle_status(&status)?,
                    scores,
                    classification: state.map(|state| Classification {
                        dominant,
                        state: ProductivityState::parse(&state),
                    }),
                });
            }
            Ok(cycles)
        })
        .await
    }
}
