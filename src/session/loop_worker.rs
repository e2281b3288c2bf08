use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::analysis::AnalysisClient;
use crate::capture::{Artifact, ClipRecorder};
use crate::classifier::classify;
use crate::error::{CycleFailure, PersistenceError};
use crate::models::{CycleResult, EmotionScores, Session, Summary};
use crate::store::SessionStore;

use super::config::RunnerConfig;
use super::poll::{poll_job, sleep_cancellable, until_cancelled, PollOutcome};
use super::summary::summarize;

// Set to false to silence per-cycle logging
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Collaborators driven by the loop. Each cycle acquires and releases its own
/// resources through them.
#[derive(Clone)]
pub(crate) struct CycleDeps {
    pub recorder: Arc<dyn ClipRecorder>,
    pub analyzer: Arc<dyn AnalysisClient>,
    pub store: Arc<dyn SessionStore>,
}

/// What the background task hands back once it has exited.
pub(crate) struct FinishedSession {
    pub session: Session,
    pub summary: Summary,
    pub summary_write: Result<(), PersistenceError>,
}

pub(crate) async fn session_loop(
    mut session: Session,
    deps: CycleDeps,
    config: RunnerConfig,
    cancel: CancellationToken,
) -> FinishedSession {
    let deadline = config.session_budget.map(|budget| Instant::now() + budget);
    let mut cycle_no: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            log_info!("session {} stop requested", session.id);
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            log_info!("session {} reached its time budget", session.id);
            break;
        }

        cycle_no += 1;
        let Some(cycle) = run_cycle(&deps, &config, &cancel).await else {
            log_info!("session {} stopped during cycle {cycle_no}; cycle abandoned", session.id);
            break;
        };

        session.push_cycle(cycle);
        if let Some(stored) = session.cycles.last() {
            match &stored.classification {
                Some(c) => log_info!(
                    "cycle {cycle_no}: {} ({})",
                    stored.status.as_str(),
                    c.state.as_str()
                ),
                None => log_info!("cycle {cycle_no}: {}", stored.status.as_str()),
            }

            if let Err(err) = deps.store.append_cycle(&session.id, stored).await {
                log_error!("cycle {cycle_no} kept in memory only: {err}");
            }
        }

        let wait = match deadline {
            Some(deadline) => config
                .cycle_interval
                .min(deadline.saturating_duration_since(Instant::now())),
            None => config.cycle_interval,
        };
        if sleep_cancellable(wait, &cancel).await {
            log_info!("session {} stopped while waiting for the next cycle", session.id);
            break;
        }
    }

    finalize(session, deps.store.as_ref(), config.override_threshold).await
}

/// One record -> upload -> poll iteration. `None` when cancelled before a
/// result exists.
async fn run_cycle(
    deps: &CycleDeps,
    config: &RunnerConfig,
    cancel: &CancellationToken,
) -> Option<CycleResult> {
    let timestamp = Utc::now();

    let outcome = match until_cancelled(deps.recorder.record(config.clip_duration), cancel).await? {
        Ok(artifact) => {
            let outcome = analyze(deps, config, &artifact, cancel).await;
            if !config.keep_clips {
                let path = artifact.path.clone();
                if let Err(err) = artifact.discard().await {
                    log_warn!("failed to remove clip {}: {err:#}", path.display());
                }
            }
            outcome?
        }
        Err(err) => Err(CycleFailure::Device(err)),
    };

    Some(match outcome {
        Ok(scores) => {
            let classification = config
                .live_classification
                .then(|| classify(&scores, config.override_threshold));
            CycleResult::succeeded(timestamp, scores, classification)
        }
        Err(failure) => {
            log_warn!("{failure}");
            CycleResult::failed(timestamp, failure.status())
        }
    })
}

async fn analyze(
    deps: &CycleDeps,
    config: &RunnerConfig,
    artifact: &Artifact,
    cancel: &CancellationToken,
) -> Option<Result<EmotionScores, CycleFailure>> {
    let job = match until_cancelled(deps.analyzer.submit(artifact), cancel).await? {
        Ok(job) => job,
        Err(err) => return Some(Err(CycleFailure::Transport(err))),
    };

    log_info!("waiting for analysis of job {job}");
    match poll_job(deps.analyzer.as_ref(), &job, &config.poll, cancel).await {
        PollOutcome::Scores(scores) => Some(Ok(scores)),
        PollOutcome::Failed(failure) => Some(Err(failure)),
        PollOutcome::Cancelled => None,
    }
}

async fn finalize(
    mut session: Session,
    store: &dyn SessionStore,
    override_threshold: f64,
) -> FinishedSession {
    let ended_at = Utc::now();
    let summary = summarize(&session, ended_at, override_threshold);
    log_info!(
        "session {} finished: {} succeeded / {} failed cycles, state {}",
        session.id,
        summary.succeeded_cycles,
        summary.failed_cycles,
        summary.state.as_str()
    );

    let summary_write = store.write_summary(&session.id, &summary).await;
    if let Err(err) = &summary_write {
        log_error!("summary for session {} not persisted: {err}", session.id);
    }

    session.finish(ended_at, summary.clone());
    FinishedSession {
        session,
        summary,
        summary_write,
    }
}
