use std::{io, path::PathBuf, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

mod ffmpeg;

pub use ffmpeg::FfmpegRecorder;

/// A recorded clip on disk.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: u64,
    pub recorded_at: DateTime<Utc>,
}

impl Artifact {
    /// Removes the clip file. A file that is already gone is not an error.
    pub async fn discard(self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Produces a fixed-duration clip from a capture device. Blocks (asynchronously)
/// for the whole duration; fails when no device is available or nothing was
/// captured.
#[async_trait]
pub trait ClipRecorder: Send + Sync {
    async fn record(&self, duration: Duration) -> Result<Artifact>;
}
