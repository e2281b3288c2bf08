use anyhow::Result;
use async_trait::async_trait;

use crate::capture::Artifact;
use crate::models::EmotionScores;

mod imentiv;

pub use imentiv::ImentivClient;

/// Opaque identifier of a submitted analysis job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(pub String);

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Maps a remote status string. Anything that is not explicitly terminal
    /// is still processing.
    pub fn from_remote(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "completed" | "succeeded" | "success" | "done" => JobStatus::Succeeded,
            "failed" | "error" => JobStatus::Failed,
            _ => JobStatus::Processing,
        }
    }
}

/// Remote emotion-analysis service.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Uploads a clip and returns the job to poll.
    async fn submit(&self, artifact: &Artifact) -> Result<JobHandle>;

    async fn status(&self, job: &JobHandle) -> Result<JobStatus>;

    /// Aggregate scores for a job. Only meaningful after `Succeeded`; may be
    /// empty.
    async fn fetch_result(&self, job: &JobHandle) -> Result<EmotionScores>;
}
