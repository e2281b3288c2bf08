#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use lumora_lib::analysis::{AnalysisClient, JobHandle, JobStatus};
use lumora_lib::capture::{Artifact, ClipRecorder};
use lumora_lib::models::{CycleResult, EmotionScores, Session, Summary};
use lumora_lib::store::SessionStore;
use lumora_lib::PersistenceError;

pub fn scores(pairs: &[(&str, f64)]) -> EmotionScores {
    pairs.iter().copied().collect()
}

/// Sleeps for the clip duration, then either fails or hands back a clip path.
pub struct FakeRecorder {
    pub fail: bool,
    pub calls: AtomicU32,
}

impl FakeRecorder {
    pub fn working() -> Self {
        Self {
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn broken() -> Self {
        Self {
            fail: true,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ClipRecorder for FakeRecorder {
    async fn record(&self, duration: Duration) -> Result<Artifact> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(duration).await;
        if self.fail {
            bail!("no working camera found");
        }
        Ok(Artifact {
            path: PathBuf::from(format!("/nonexistent/clip_{n}.avi")),
            bytes: 1024,
            recorded_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum Job {
    UploadFails,
    RemoteFails,
    Empty,
    /// Succeeds after `processing` non-terminal status checks.
    Scores { processing: u32, scores: EmotionScores },
    NeverFinishes,
}

/// Plays one scripted `Job` per submitted clip. Once the script runs out,
/// every job stays in processing.
pub struct FakeAnalyzer {
    script: Mutex<VecDeque<Job>>,
    current: Mutex<Option<(Job, u32)>>,
    pub status_calls: AtomicU32,
}

impl FakeAnalyzer {
    pub fn new(script: Vec<Job>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            current: Mutex::new(None),
            status_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AnalysisClient for FakeAnalyzer {
    async fn submit(&self, artifact: &Artifact) -> Result<JobHandle> {
        let job = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Job::NeverFinishes);
        if matches!(job, Job::UploadFails) {
            bail!("upload rejected (503)");
        }
        *self.current.lock().unwrap() = Some((job, 0));
        Ok(JobHandle(artifact.path.display().to_string()))
    }

    async fn status(&self, _job: &JobHandle) -> Result<JobStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.current.lock().unwrap();
        let (job, seen) = guard.as_mut().ok_or_else(|| anyhow!("no job"))?;
        *seen += 1;
        Ok(match job {
            Job::RemoteFails => JobStatus::Failed,
            Job::Empty => JobStatus::Succeeded,
            Job::Scores { processing, .. } if *seen > *processing => JobStatus::Succeeded,
            _ => JobStatus::Processing,
        })
    }

    async fn fetch_result(&self, _job: &JobHandle) -> Result<EmotionScores> {
        let guard = self.current.lock().unwrap();
        match guard.as_ref() {
            Some((Job::Scores { scores, .. }, _)) => Ok(scores.clone()),
            _ => Ok(EmotionScores::new()),
        }
    }
}

/// In-memory store with switchable failures and a slow summary write.
#[derive(Default)]
pub struct MemoryStore {
    pub opened: Mutex<Vec<String>>,
    pub cycles: Mutex<Vec<(String, CycleResult)>>,
    pub summaries: Mutex<Vec<Summary>>,
    pub fail_appends: bool,
    pub fail_summary: bool,
    pub summary_delay: Option<Duration>,
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn open_session(&self, session: &Session) -> Result<(), PersistenceError> {
        self.opened.lock().unwrap().push(session.id.clone());
        Ok(())
    }

    async fn append_cycle(
        &self,
        session_id: &str,
        cycle: &CycleResult,
    ) -> Result<(), PersistenceError> {
        if self.fail_appends {
            return Err(PersistenceError::new("append cycle", anyhow!("disk full")));
        }
        self.cycles
            .lock()
            .unwrap()
            .push((session_id.to_string(), cycle.clone()));
        Ok(())
    }

    async fn write_summary(
        &self,
        _session_id: &str,
        summary: &Summary,
    ) -> Result<(), PersistenceError> {
        if let Some(delay) = self.summary_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_summary {
            return Err(PersistenceError::new("write summary", anyhow!("read-only filesystem")));
        }
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }
}
