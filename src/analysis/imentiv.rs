use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use serde_json::Value;

use crate::capture::Artifact;
use crate::models::EmotionScores;
use crate::settings::AnalysisSettings;

use super::{AnalysisClient, JobHandle, JobStatus};

const API_KEY_HEADER: &str = "X-API-Key";

/// HTTP client for the Imentiv video emotion API.
pub struct ImentivClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    description: String,
}

impl ImentivClient {
    pub fn new(settings: &AnalysisSettings, api_key: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            description: settings.description.clone(),
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("no API key configured"))
    }

    fn video_url(&self, job: &JobHandle) -> String {
        format!("{}/v1/videos/{}", self.base_url, job.0)
    }
}

fn job_id_from_body(body: &Value) -> Option<String> {
    ["id", "video_id"].iter().find_map(|key| match body.get(key) {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

fn status_from_body(body: &Value) -> Result<JobStatus> {
    body.get("status")
        .and_then(Value::as_str)
        .map(JobStatus::from_remote)
        .ok_or_else(|| anyhow!("status response has no status field"))
}

#[async_trait]
impl AnalysisClient for ImentivClient {
    async fn submit(&self, artifact: &Artifact) -> Result<JobHandle> {
        let api_key = self.api_key()?;
        let file_name = artifact
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip.avi".into());

        let bytes = tokio::fs::read(&artifact.path)
            .await
            .with_context(|| format!("failed to read clip {}", artifact.path.display()))?;

        let video = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("video/avi")?;
        let form = Form::new()
            .part("video_file", video)
            .text("title", file_name)
            .text("description", self.description.clone())
            .text("generate_audio_summary", "false");

        let response = self
            .http
            .post(format!("{}/v1/videos", self.base_url))
            .header(API_KEY_HEADER, api_key)
            .header("accept", "application/json")
            .multipart(form)
            .send()
            .await
            .context("upload request failed")?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!("Upload response ({status}): {text}");

        if !matches!(
            status,
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED
        ) {
            bail!("upload rejected ({status}): {text}");
        }

        let body: Value = serde_json::from_str(&text).context("upload response is not JSON")?;
        let id = job_id_from_body(&body).ok_or_else(|| anyhow!("upload response has no job id"))?;
        info!("Uploaded clip as job {id}");
        Ok(JobHandle(id))
    }

    async fn status(&self, job: &JobHandle) -> Result<JobStatus> {
        let response = self
            .http
            .get(self.video_url(job))
            .header(API_KEY_HEADER, self.api_key()?)
            .header("accept", "application/json")
            .send()
            .await
            .context("status request failed")?;

        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            bail!("status check failed ({status}): {text}");
        }

        let body: Value = response.json().await.context("status response is not JSON")?;
        status_from_body(&body)
    }

    async fn fetch_result(&self, job: &JobHandle) -> Result<EmotionScores> {
        let response = self
            .http
            .get(format!("{}/emotions/aggregate", self.video_url(job)))
            .header(API_KEY_HEADER, self.api_key()?)
            .header("accept", "application/json")
            .send()
            .await
            .context("emotion request failed")?;

        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            bail!("emotion fetch failed ({status}): {text}");
        }

        let body: Value = response.json().await.context("emotion response is not JSON")?;
        Ok(EmotionScores::from_json(&body))
    }
}
