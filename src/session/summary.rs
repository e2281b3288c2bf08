use chrono::{DateTime, Utc};

use crate::classifier::classify;
use crate::models::{EmotionScores, Session, Summary};

/// Aggregates the succeeded cycles of `session` into its final summary.
pub fn summarize(session: &Session, ended_at: DateTime<Utc>, override_threshold: f64) -> Summary {
    let succeeded: Vec<&EmotionScores> = session
        .succeeded_cycles()
        .map(|cycle| &cycle.scores)
        .collect();
    let succeeded_cycles = succeeded.len() as u32;
    let failed_cycles = session.cycles.len() as u32 - succeeded_cycles;

    let mean_scores = EmotionScores::mean(succeeded);
    let classification = classify(&mean_scores, override_threshold);

    let duration_ms = (ended_at - session.started_at).num_milliseconds().max(0);

    Summary {
        session_id: session.id.clone(),
        started_at: session.started_at,
        ended_at,
        duration_secs: duration_ms as f64 / 1000.0,
        mean_scores,
        dominant: classification.dominant,
        state: classification.state,
        succeeded_cycles,
        failed_cycles,
    }
}
