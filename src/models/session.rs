use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CycleResult, Summary};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Running,
    Completed,
    Interrupted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "Running",
            SessionStatus::Completed => "Completed",
            SessionStatus::Interrupted => "Interrupted",
        }
    }
}

/// One tracking session. Owned by the runner's background task while it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub cycles: Vec<CycleResult>,
    pub summary: Option<Summary>,
}

impl Session {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at,
            ended_at: None,
            status: SessionStatus::Running,
            cycles: Vec::new(),
            summary: None,
        }
    }

    /// Directory-friendly name, e.g. `session_20250101_093000_1a2b3c4d`.
    pub fn name(&self) -> String {
        let short_id: String = self.id.chars().take(8).collect();
        format!(
            "session_{}_{}",
            self.started_at.format("%Y%m%d_%H%M%S"),
            short_id
        )
    }

    /// Appends a cycle, clamping its timestamp so the sequence never goes
    /// backwards when the wall clock does.
    pub fn push_cycle(&mut self, mut cycle: CycleResult) {
        if let Some(last) = self.cycles.last() {
            if cycle.timestamp < last.timestamp {
                cycle.timestamp = last.timestamp;
            }
        }
        self.cycles.push(cycle);
    }

    pub fn succeeded_cycles(&self) -> impl Iterator<Item = &CycleResult> {
        self.cycles.iter().filter(|cycle| cycle.is_success())
    }

    pub fn finish(&mut self, ended_at: DateTime<Utc>, summary: Summary) {
        self.ended_at = Some(ended_at);
        self.status = SessionStatus::Completed;
        self.summary = Some(summary);
    }
}
