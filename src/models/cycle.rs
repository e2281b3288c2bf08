use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::Classification;

use super::EmotionScores;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Succeeded,
    RecordingFailed,
    UploadFailed,
    AnalysisFailed,
    TimedOut,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Succeeded => "succeeded",
            CycleStatus::RecordingFailed => "recording_failed",
            CycleStatus::UploadFailed => "upload_failed",
            CycleStatus::AnalysisFailed => "analysis_failed",
            CycleStatus::TimedOut => "timed_out",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "succeeded" => Some(CycleStatus::Succeeded),
            "recording_failed" => Some(CycleStatus::RecordingFailed),
            "upload_failed" => Some(CycleStatus::UploadFailed),
            "analysis_failed" => Some(CycleStatus::AnalysisFailed),
            "timed_out" => Some(CycleStatus::TimedOut),
            _ => None,
        }
    }
}

/// Outcome of one record -> upload -> poll iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleResult {
    pub timestamp: DateTime<Utc>,
    pub status: CycleStatus,
    pub scores: EmotionScores,
    /// Live classification of this cycle's scores, when enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
}

impl CycleResult {
    /// A successful cycle. Empty scores are never a success and are recorded
    /// as `analysis_failed`.
    pub fn succeeded(
        timestamp: DateTime<Utc>,
        scores: EmotionScores,
        classification: Option<Classification>,
    ) -> Self {
        if scores.is_empty() {
            return Self::failed(timestamp, CycleStatus::AnalysisFailed);
        }
        Self {
            timestamp,
            status: CycleStatus::Succeeded,
            scores,
            classification,
        }
    }

    pub fn failed(timestamp: DateTime<Utc>, status: CycleStatus) -> Self {
        Self {
            timestamp,
            status,
            scores: EmotionScores::new(),
            classification: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CycleStatus::Succeeded
    }
}
