use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use tokio::process::Command;

use crate::settings::CameraSettings;

use super::{Artifact, ClipRecorder};

const RECORD_GRACE_SECS: u64 = 15;

/// Records clips by running `ffmpeg` against the platform camera input.
pub struct FfmpegRecorder {
    camera: CameraSettings,
    clips_dir: PathBuf,
}

impl FfmpegRecorder {
    pub fn new(camera: CameraSettings, clips_dir: PathBuf) -> Self {
        Self { camera, clips_dir }
    }

    fn clip_path(&self) -> PathBuf {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        self.clips_dir.join(format!("clip_{timestamp}.avi"))
    }
}

/// Owns the output path of a recording in progress. Unless kept, the file is
/// removed when the guard drops, which covers early returns and a recording
/// future dropped by a stop.
struct PendingClip {
    path: Option<PathBuf>,
}

impl PendingClip {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    fn keep(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for PendingClip {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Removed partial clip {}", path.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to remove partial clip {}: {err}", path.display()),
        }
    }
}

fn build_args(camera: &CameraSettings, duration: Duration, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-f".into(),
        camera.input_format.clone(),
        "-framerate".into(),
        camera.fps.to_string(),
        "-video_size".into(),
        format!("{}x{}", camera.width, camera.height),
        "-i".into(),
        camera.device.clone(),
        "-t".into(),
        format!("{:.3}", duration.as_secs_f64()),
        "-c:v".into(),
        "mjpeg".into(),
        "-q:v".into(),
        "5".into(),
        output.display().to_string(),
    ]
}

#[async_trait]
impl ClipRecorder for FfmpegRecorder {
    async fn record(&self, duration: Duration) -> Result<Artifact> {
        tokio::fs::create_dir_all(&self.clips_dir)
            .await
            .with_context(|| format!("failed to create {}", self.clips_dir.display()))?;

        let pending = PendingClip::new(self.clip_path());
        let args = build_args(&self.camera, duration, pending.path());
        debug!("{} {}", self.camera.ffmpeg_bin, args.join(" "));

        let child = Command::new(&self.camera.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to launch {}", self.camera.ffmpeg_bin))?;

        let limit = duration + Duration::from_secs(RECORD_GRACE_SECS);
        let output = tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("recording did not finish within {}s", limit.as_secs()))?
            .context("failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ffmpeg exited with {}: {}", output.status, stderr.trim());
        }

        let bytes = match tokio::fs::metadata(pending.path()).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        if bytes == 0 {
            bail!("no frames captured from {}", self.camera.device);
        }

        let path = pending.keep();
        info!("Clip saved: {} ({} bytes)", path.display(), bytes);
        Ok(Artifact {
            path,
            bytes,
            recorded_at: Utc::now(),
        })
    }
}
