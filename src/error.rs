use thiserror::Error;
use tokio::task::JoinError;

use crate::models::CycleStatus;

/// Write failure reported by a [`crate::store::SessionStore`].
#[derive(Debug, Error)]
#[error("failed to {operation}: {source:#}")]
pub struct PersistenceError {
    pub operation: &'static str,
    #[source]
    pub source: anyhow::Error,
}

impl PersistenceError {
    pub fn new(operation: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }
}

/// Errors surfaced to callers of the session runner.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("a session is already running")]
    AlreadyRunning,
    #[error("no active session to stop")]
    NotRunning,
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("session worker failed to join: {0}")]
    Worker(#[from] JoinError),
}

impl TrackerError {
    /// True for start-while-running and stop-while-idle.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, TrackerError::AlreadyRunning | TrackerError::NotRunning)
    }
}

/// Why a single cycle did not produce scores. Always recovered at the cycle
/// boundary.
#[derive(Debug, Error)]
pub enum CycleFailure {
    #[error("recording failed: {0:#}")]
    Device(anyhow::Error),
    #[error("upload failed: {0:#}")]
    Transport(anyhow::Error),
    #[error("remote analysis reported failure")]
    Remote,
    #[error("analysis returned no emotion scores")]
    EmptyResult,
    #[error("no terminal status after {attempts} attempts")]
    Timeout { attempts: u32 },
}

impl CycleFailure {
    pub fn status(&self) -> CycleStatus {
        match self {
            CycleFailure::Device(_) => CycleStatus::RecordingFailed,
            CycleFailure::Transport(_) => CycleStatus::UploadFailed,
            CycleFailure::Remote | CycleFailure::EmptyResult => CycleStatus::AnalysisFailed,
            CycleFailure::Timeout { .. } => CycleStatus::TimedOut,
        }
    }
}
