use std::{sync::Arc, time::Duration};

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::analysis::AnalysisClient;
use crate::capture::ClipRecorder;
use crate::error::TrackerError;
use crate::models::{Session, Summary};
use crate::store::SessionStore;

use super::config::RunnerConfig;
use super::loop_worker::{session_loop, CycleDeps, FinishedSession};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RunnerPhase {
    Idle,
    Running,
    Stopping,
}

#[derive(Debug, Clone)]
pub enum StopOutcome {
    /// The background task exited and the summary was persisted.
    Stopped(Summary),
    /// Stop was signalled but the task did not exit within the join timeout.
    /// The runner stays in `Stopping`; call `stop()` again to collect it.
    Unconfirmed { session_id: String },
}

struct ActiveSession {
    session_id: String,
    cancel: CancellationToken,
    handle: JoinHandle<FinishedSession>,
    join_timeout: Duration,
}

/// Drives at most one background session at a time.
pub struct SessionRunner {
    deps: CycleDeps,
    active: Option<ActiveSession>,
    last_summary: Option<Summary>,
}

impl SessionRunner {
    pub fn new(
        recorder: Arc<dyn ClipRecorder>,
        analyzer: Arc<dyn AnalysisClient>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            deps: CycleDeps {
                recorder,
                analyzer,
                store,
            },
            active: None,
            last_summary: None,
        }
    }

    pub fn phase(&self) -> RunnerPhase {
        match &self.active {
            None => RunnerPhase::Idle,
            Some(active) if active.cancel.is_cancelled() || active.handle.is_finished() => {
                RunnerPhase::Stopping
            }
            Some(_) => RunnerPhase::Running,
        }
    }

    /// True when the background task has already exited (stopped or budget
    /// spent) and is waiting to be collected with `stop()` or `wait()`.
    pub fn has_exited(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.handle.is_finished())
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.session_id.as_str())
    }

    /// Summary of the most recently completed session.
    pub fn last_summary(&self) -> Option<&Summary> {
        self.last_summary.as_ref()
    }

    /// Opens a new session and starts cycling in the background. Returns the
    /// session id without waiting for the first cycle.
    pub async fn start(&mut self, config: RunnerConfig) -> Result<String, TrackerError> {
        if self.active.is_some() {
            return Err(TrackerError::AlreadyRunning);
        }
        config.validate()?;

        let session = Session::new(Utc::now());
        self.deps.store.open_session(&session).await?;

        let session_id = session.id.clone();
        let cancel = CancellationToken::new();
        let join_timeout = config.join_timeout;
        let handle = tokio::spawn(session_loop(
            session,
            self.deps.clone(),
            config,
            cancel.clone(),
        ));

        info!("Session {session_id} started");
        self.active = Some(ActiveSession {
            session_id: session_id.clone(),
            cancel,
            handle,
            join_timeout,
        });
        Ok(session_id)
    }

    /// Signals the background task and waits up to the join timeout for it to
    /// exit.
    pub async fn stop(&mut self) -> Result<StopOutcome, TrackerError> {
        let active = self.active.as_mut().ok_or(TrackerError::NotRunning)?;

        if !active.cancel.is_cancelled() {
            info!("Stopping session {}", active.session_id);
            active.cancel.cancel();
        }

        let joined = tokio::time::timeout(active.join_timeout, &mut active.handle).await;
        match joined {
            Ok(joined) => self.complete(joined).map(StopOutcome::Stopped),
            Err(_) => {
                warn!(
                    "Session {} did not exit within {:?}; stop unconfirmed",
                    active.session_id, active.join_timeout
                );
                Ok(StopOutcome::Unconfirmed {
                    session_id: active.session_id.clone(),
                })
            }
        }
    }

    /// Waits for the session to end on its own (time budget) without
    /// signalling a stop.
    pub async fn wait(&mut self) -> Result<Summary, TrackerError> {
        let active = self.active.as_mut().ok_or(TrackerError::NotRunning)?;
        let joined = (&mut active.handle).await;
        self.complete(joined)
    }

    fn complete(
        &mut self,
        joined: Result<FinishedSession, JoinError>,
    ) -> Result<Summary, TrackerError> {
        self.active = None;
        let finished = joined?;

        info!(
            "Session {} ended after {:.1} min ({} cycles)",
            finished.session.id,
            finished.summary.duration_minutes(),
            finished.session.cycles.len()
        );
        self.last_summary = Some(finished.summary.clone());
        finished.summary_write?;
        Ok(finished.summary)
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}
