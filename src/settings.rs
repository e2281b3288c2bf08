use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const API_KEY_ENV: &str = "LUMORA_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub clip_duration_secs: u64,
    pub cycle_interval_secs: u64,
    /// Total wall-clock cap for a session; unlimited when absent.
    pub session_minutes: Option<u64>,
    pub poll_attempts: u32,
    pub poll_interval_secs: u64,
    pub override_threshold: f64,
    pub live_classification: bool,
    pub join_timeout_secs: u64,
    pub keep_clips: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            clip_duration_secs: 5,
            cycle_interval_secs: 30,
            session_minutes: None,
            poll_attempts: 20,
            poll_interval_secs: 10,
            override_threshold: 0.1,
            live_classification: true,
            join_timeout_secs: 10,
            keep_clips: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub ffmpeg_bin: String,
    pub input_format: String,
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        let (input_format, device) = if cfg!(target_os = "macos") {
            ("avfoundation", "0")
        } else if cfg!(target_os = "windows") {
            ("dshow", "video=Integrated Camera")
        } else {
            ("v4l2", "/dev/video0")
        };

        Self {
            ffmpeg_bin: "ffmpeg".into(),
            input_format: input_format.into(),
            device: device.into(),
            width: 640,
            height: 480,
            fps: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub description: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.imentiv.ai".into(),
            api_key: None,
            request_timeout_secs: 30,
            description: "Lumora session clip".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Files,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub runner: RunnerSettings,
    pub camera: CameraSettings,
    pub analysis: AnalysisSettings,
    pub storage: StorageBackend,
}

pub struct SettingsStore {
    path: PathBuf,
    data: TrackerSettings,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings at {}: {err}", path.display());
                TrackerSettings::default()
            })
        } else {
            TrackerSettings::default()
        };

        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tracker(&self) -> TrackerSettings {
        self.data.clone()
    }

    /// API key from the environment, falling back to the settings file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.data.analysis.api_key.clone())
    }

    /// Writes the current settings out, e.g. to seed a first-run file.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.tracker();
        assert_eq!(settings.runner.poll_attempts, 20);
        assert_eq!(settings.storage, StorageBackend::Sqlite);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"runner": {"cycle_interval_secs": 0}, "storage": "files"}"#,
        )
        .unwrap();

        let settings = SettingsStore::new(path).unwrap().tracker();
        assert_eq!(settings.runner.cycle_interval_secs, 0);
        assert_eq!(settings.runner.clip_duration_secs, 5);
        assert_eq!(settings.storage, StorageBackend::Files);
    }

    #[test]
    fn save_seeds_a_first_run_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        assert!(!path.exists());

        store.save().unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["runner"]["cycle_interval_secs"], 30);
        assert_eq!(written["storage"], "sqlite");

        let reloaded = SettingsStore::new(path).unwrap().tracker();
        assert_eq!(reloaded.runner.poll_attempts, 20);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        let settings = SettingsStore::new(path).unwrap().tracker();
        assert_eq!(settings.runner.join_timeout_secs, 10);
    }
}
