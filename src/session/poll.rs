//! Bounded polling of a submitted analysis job.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::analysis::{AnalysisClient, JobHandle, JobStatus};
use crate::error::CycleFailure;
use crate::models::EmotionScores;

use super::config::PollConfig;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// `attempt` status checks have been made so far.
    Processing { attempt: u32 },
    Succeeded,
    Failed,
    TimedOut,
}

impl PollState {
    pub fn start() -> Self {
        PollState::Processing { attempt: 0 }
    }

    /// Folds one status check into the machine. `None` is a check that could
    /// not be completed and counts as still processing.
    pub fn advance(self, observed: Option<JobStatus>, max_attempts: u32) -> Self {
        let PollState::Processing { attempt } = self else {
            return self;
        };
        let attempt = attempt + 1;

        match observed {
            Some(JobStatus::Succeeded) => PollState::Succeeded,
            Some(JobStatus::Failed) => PollState::Failed,
            Some(JobStatus::Processing) | None if attempt >= max_attempts => PollState::TimedOut,
            Some(JobStatus::Processing) | None => PollState::Processing { attempt },
        }
    }
}

#[derive(Debug)]
pub enum PollOutcome {
    Scores(EmotionScores),
    Failed(CycleFailure),
    Cancelled,
}

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn until_cancelled<F: Future>(
    fut: F,
    cancel: &CancellationToken,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}

/// Sleeps for `duration`; returns `true` if cancelled first.
pub(crate) async fn sleep_cancellable(duration: Duration, cancel: &CancellationToken) -> bool {
    until_cancelled(tokio::time::sleep(duration), cancel)
        .await
        .is_none()
}

pub async fn poll_job(
    client: &dyn AnalysisClient,
    job: &JobHandle,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> PollOutcome {
    let mut state = PollState::start();

    loop {
        let observed = match until_cancelled(client.status(job), cancel).await {
            None => return PollOutcome::Cancelled,
            Some(Ok(status)) => Some(status),
            Some(Err(err)) => {
                log_warn!("status check for job {job} failed: {err:#}");
                None
            }
        };

        state = state.advance(observed, config.max_attempts);
        log_debug!("job {job}: {:?} after {:?}", state, observed);

        match state {
            PollState::Processing { .. } => {
                if sleep_cancellable(config.interval, cancel).await {
                    return PollOutcome::Cancelled;
                }
            }
            PollState::Succeeded => {
                return match until_cancelled(client.fetch_result(job), cancel).await {
                    None => PollOutcome::Cancelled,
                    Some(Ok(scores)) if !scores.is_empty() => PollOutcome::Scores(scores),
                    Some(Ok(_)) => PollOutcome::Failed(CycleFailure::EmptyResult),
                    Some(Err(err)) => {
                        log_warn!("fetching results for job {job} failed: {err:#}");
                        PollOutcome::Failed(CycleFailure::EmptyResult)
                    }
                };
            }
            PollState::Failed => return PollOutcome::Failed(CycleFailure::Remote),
            PollState::TimedOut => {
                return PollOutcome::Failed(CycleFailure::Timeout {
                    attempts: config.max_attempts,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Artifact;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays scripted status responses; the last one repeats.
    struct Scripted {
        statuses: Mutex<VecDeque<Option<JobStatus>>>,
        result: EmotionScores,
        checks: AtomicU32,
    }

    impl Scripted {
        fn new(statuses: &[Option<JobStatus>], result: EmotionScores) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                result,
                checks: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl AnalysisClient for Scripted {
        async fn submit(&self, _artifact: &Artifact) -> Result<JobHandle> {
            Ok(JobHandle("job".into()))
        }

        async fn status(&self, _job: &JobHandle) -> Result<JobStatus> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            let mut guard = self.statuses.lock().unwrap();
            let next = if guard.len() > 1 {
                guard.pop_front().flatten()
            } else {
                guard.front().copied().flatten()
            };
            next.ok_or_else(|| anyhow!("connection reset"))
        }

        async fn fetch_result(&self, _job: &JobHandle) -> Result<EmotionScores> {
            Ok(self.result.clone())
        }
    }

    fn config(max_attempts: u32) -> PollConfig {
        PollConfig {
            max_attempts,
            interval: Duration::from_secs(10),
        }
    }

    async fn run(client: &Scripted, max_attempts: u32) -> PollOutcome {
        let job = JobHandle("j".into());
        poll_job(client, &job, &config(max_attempts), &CancellationToken::new()).await
    }

    fn happy() -> EmotionScores {
        [("happy", 0.8)].into_iter().collect()
    }

    #[test]
    fn state_machine_transitions() {
        let s = PollState::start().advance(Some(JobStatus::Processing), 3);
        assert_eq!(s, PollState::Processing { attempt: 1 });
        let s = s.advance(None, 3);
        assert_eq!(s, PollState::Processing { attempt: 2 });
        assert_eq!(s.advance(None, 3), PollState::TimedOut);
        assert_eq!(s.advance(Some(JobStatus::Succeeded), 3), PollState::Succeeded);
        assert_eq!(
            PollState::start().advance(Some(JobStatus::Failed), 3),
            PollState::Failed
        );
        assert_eq!(
            PollState::Failed.advance(Some(JobStatus::Succeeded), 3),
            PollState::Failed
        );
    }

    #[test]
    fn terminal_status_on_last_attempt_wins() {
        let s = PollState::Processing { attempt: 2 };
        assert_eq!(s.advance(Some(JobStatus::Succeeded), 3), PollState::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_scores_after_processing() {
        let client = Scripted::new(
            &[Some(JobStatus::Processing), None, Some(JobStatus::Succeeded)],
            happy(),
        );
        let outcome = run(&client, 20).await;
        assert!(matches!(outcome, PollOutcome::Scores(ref s) if s.get("happy") == Some(0.8)));
        assert_eq!(client.checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_result_is_analysis_failure() {
        let client = Scripted::new(&[Some(JobStatus::Succeeded)], EmotionScores::new());
        let outcome = run(&client, 20).await;
        assert!(matches!(outcome, PollOutcome::Failed(CycleFailure::EmptyResult)));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_stops_polling() {
        let client = Scripted::new(&[Some(JobStatus::Failed)], happy());
        let outcome = run(&client, 20).await;
        assert!(matches!(outcome, PollOutcome::Failed(CycleFailure::Remote)));
        assert_eq!(client.checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_attempts_times_out() {
        let client = Scripted::new(&[None], happy());
        let outcome = run(&client, 4).await;
        assert!(matches!(
            outcome,
            PollOutcome::Failed(CycleFailure::Timeout { attempts: 4 })
        ));
        assert_eq!(client.checks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_sleep() {
        let client = Scripted::new(&[Some(JobStatus::Processing)], happy());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let outcome = poll_job(&client, &JobHandle("j".into()), &config(20), &cancel).await;

        assert!(matches!(outcome, PollOutcome::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(16));
        assert_eq!(client.checks.load(Ordering::SeqCst), 2);
    }
}
