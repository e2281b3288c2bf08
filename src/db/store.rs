use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::models::{CycleResult, Session, Summary};
use crate::store::SessionStore;

use super::Database;

#[async_trait]
impl SessionStore for Database {
    async fn open_session(&self, session: &Session) -> Result<(), PersistenceError> {
        self.insert_session(&session.id, session.started_at)
            .await
            .map_err(|err| err.into_persistence("open session"))
    }

    async fn append_cycle(
        &self,
        session_id: &str,
        cycle: &CycleResult,
    ) -> Result<(), PersistenceError> {
        self.insert_cycle(session_id, cycle)
            .await
            .map_err(|err| err.into_persistence("append cycle"))
    }

    async fn write_summary(
        &self,
        _session_id: &str,
        summary: &Summary,
    ) -> Result<(), PersistenceError> {
        self.insert_summary(summary)
            .await
            .map_err(|err| err.into_persistence("write summary"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{classify, ProductivityState, DEFAULT_OVERRIDE_THRESHOLD};
    use crate::models::{CycleStatus, EmotionScores, SessionStatus};
    use crate::session::summarize;
    use chrono::{Duration, Utc};

    fn open_db(dir: &tempfile::TempDir) -> Database {
        Database::new(dir.path().join("lumora.sqlite3")).unwrap()
    }

    #[tokio::test]
    async fn cycles_survive_reopen_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let start = Utc::now();
        let session = Session::new(start);

        {
            let db = open_db(&dir);
            db.open_session(&session).await.unwrap();

            let scores: EmotionScores = [("neutral", 0.5), ("happy", 0.15)].into_iter().collect();
            let live = classify(&scores, DEFAULT_OVERRIDE_THRESHOLD);
            db.append_cycle(&session.id, &CycleResult::succeeded(start, scores, Some(live)))
                .await
                .unwrap();
            db.append_cycle(
                &session.id,
                &CycleResult::failed(start + Duration::seconds(40), CycleStatus::RecordingFailed),
            )
            .await
            .unwrap();
        }

        let db = open_db(&dir);
        let cycles = db.get_cycles_for_session(&session.id).await.unwrap();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].status, CycleStatus::Succeeded);
        let live = cycles[0].classification.as_ref().unwrap();
        assert_eq!(live.dominant.as_deref(), Some("happy"));
        assert_eq!(live.state, ProductivityState::HappyFocused);
        assert_eq!(cycles[1].status, CycleStatus::RecordingFailed);
        assert!(cycles[1].scores.is_empty());
        assert!(cycles[0].timestamp <= cycles[1].timestamp);
    }

    #[tokio::test]
    async fn summary_completes_session_and_shows_in_history() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let start = Utc::now();
        let mut session = Session::new(start);
        db.open_session(&session).await.unwrap();

        let scores: EmotionScores = [("sad", 0.6), ("happy", 0.1)].into_iter().collect();
        session.push_cycle(CycleResult::succeeded(start, scores, None));
        let ended = start + Duration::seconds(75);
        let summary = summarize(&session, ended, DEFAULT_OVERRIDE_THRESHOLD);
        db.write_summary(&session.id, &summary).await.unwrap();

        let record = db.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(record.status, SessionStatus::Completed);
        assert_eq!(record.ended_at, Some(summary.ended_at));

        let stored = db.get_summary(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.state, ProductivityState::FatiguedStressed);
        assert_eq!(stored.succeeded_cycles, 1);
        assert_eq!(stored.dominant.as_deref(), Some("sad"));

        let history = db.list_sessions(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].session.id, session.id);
        assert_eq!(
            history[0].summary.as_ref().map(|s| s.state),
            Some(ProductivityState::FatiguedStressed)
        );
    }

    #[tokio::test]
    async fn running_sessions_can_be_marked_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let session = Session::new(Utc::now());
        db.open_session(&session).await.unwrap();

        let incomplete = db.get_incomplete_sessions().await.unwrap();
        assert_eq!(incomplete.len(), 1);

        db.mark_session_interrupted(&session.id, Utc::now()).await.unwrap();
        assert!(db.get_incomplete_sessions().await.unwrap().is_empty());

        let history = db.list_sessions(10).await.unwrap();
        assert_eq!(history[0].session.status, SessionStatus::Interrupted);
        assert!(history[0].summary.is_none());
    }

    #[tokio::test]
    async fn cycle_for_unknown_session_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let err = db
            .append_cycle("missing", &CycleResult::failed(Utc::now(), CycleStatus::TimedOut))
            .await
            .unwrap_err();
        assert_eq!(err.operation, "append cycle");
    }
}
