use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::ProductivityState;

use super::EmotionScores;

/// End-of-session aggregate. Computed once when the session stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub mean_scores: EmotionScores,
    pub dominant: Option<String>,
    pub state: ProductivityState,
    pub succeeded_cycles: u32,
    pub failed_cycles: u32,
}

impl Summary {
    pub fn total_cycles(&self) -> u32 {
        self.succeeded_cycles + self.failed_cycles
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_secs / 60.0
    }
}
