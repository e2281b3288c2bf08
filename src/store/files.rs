use std::{collections::HashMap, path::PathBuf, sync::Mutex};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use log::info;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::PersistenceError;
use crate::models::{CycleResult, Session, Summary};

use super::SessionStore;

const CYCLE_LOG: &str = "cycles.jsonl";
const SUMMARY_FILE: &str = "summary.json";

/// One line of `cycles.jsonl`.
#[derive(Serialize)]
struct CycleRecord<'a> {
    timestamp: String,
    status: &'static str,
    scores: &'a crate::models::EmotionScores,
    #[serde(skip_serializing_if = "Option::is_none")]
    dominant: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'static str>,
}

/// Stores each session in its own directory under `root`.
pub struct FileStore {
    root: PathBuf,
    dirs: Mutex<HashMap<String, PathBuf>>,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            dirs: Mutex::new(HashMap::new()),
        }
    }

    fn session_dir(&self, session_id: &str) -> anyhow::Result<PathBuf> {
        let guard = self.dirs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .get(session_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown session {session_id}"))
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn open_session(&self, session: &Session) -> Result<(), PersistenceError> {
        let dir = self.root.join(session.name());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))
            .map_err(|err| PersistenceError::new("open session", err))?;

        info!("Session directory: {}", dir.display());
        self.dirs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(session.id.clone(), dir);
        Ok(())
    }

    async fn append_cycle(
        &self,
        session_id: &str,
        cycle: &CycleResult,
    ) -> Result<(), PersistenceError> {
        let result: anyhow::Result<()> = async {
            let path = self.session_dir(session_id)?.join(CYCLE_LOG);
            let record = CycleRecord {
                timestamp: cycle.timestamp.to_rfc3339(),
                status: cycle.status.as_str(),
                scores: &cycle.scores,
                dominant: cycle
                    .classification
                    .as_ref()
                    .and_then(|c| c.dominant.as_deref()),
                state: cycle.classification.as_ref().map(|c| c.state.as_str()),
            };
            let mut line = serde_json::to_string(&record)?;
            line.push('\n');

            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            file.write_all(line.as_bytes()).await?;
            file.sync_data().await?;
            Ok(())
        }
        .await;

        result.map_err(|err| PersistenceError::new("append cycle", err))
    }

    async fn write_summary(
        &self,
        session_id: &str,
        summary: &Summary,
    ) -> Result<(), PersistenceError> {
        let result: anyhow::Result<()> = async {
            let path = self.session_dir(session_id)?.join(SUMMARY_FILE);
            let body = serde_json::to_string_pretty(summary)?;
            tokio::fs::write(&path, body)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Saved session summary to {}", path.display());
            Ok(())
        }
        .await;

        result.map_err(|err| PersistenceError::new("write summary", err))
    }
}
