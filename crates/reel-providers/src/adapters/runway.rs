//! Runway image-to-video motion clips.
//!
//! Runway runs generation as an asynchronous task: the adapter submits the
//! scene image, polls the task until it settles and downloads the first
//! output. A task still running after the maximum wait is reported as a
//! transient failure so the chain may try again.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reel_models::{Capability, Provider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::http::{check_status, classify_request_error, io_failure, trim_base, write_response};
use crate::adapter::{require_credential, ProviderAdapter};
use crate::error::ProviderFailure;
use crate::outcome::Artifact;
use crate::policy::{MOTION_MAX_WAIT, MOTION_POLL_INTERVAL};
use crate::request::GenerationParams;
use crate::validation::sniff_image_type;

pub const RUNWAY_BASE_URL: &str = "https://api.dev.runwayml.com";

const API_VERSION: &str = "2024-11-06";
const MODEL: &str = "gen3a_turbo";
const RATIO: &str = "1280:768";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageToVideoRequest<'a> {
    model: &'a str,
    prompt_image: String,
    prompt_text: &'a str,
    duration: u32,
    ratio: &'a str,
}

#[derive(Debug, Deserialize)]
struct TaskCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    status: String,
    #[serde(default)]
    output: Vec<String>,
    #[serde(default)]
    failure: Option<String>,
}

pub struct RunwayMotion {
    client: Client,
    base_url: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl RunwayMotion {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, RUNWAY_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
            poll_interval: MOTION_POLL_INTERVAL,
            max_wait: MOTION_MAX_WAIT,
        }
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    async fn submit(&self, api_key: &str, body: &ImageToVideoRequest<'_>) -> Result<String, ProviderFailure> {
        let response = self
            .client
            .post(format!("{}/v1/image_to_video", self.base_url))
            .bearer_auth(api_key)
            .header("X-Runway-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(classify_request_error)?;
        let response = check_status(response).await?;

        let created: TaskCreated = response
            .json()
            .await
            .map_err(|e| ProviderFailure::transient(format!("malformed Runway task: {}", e)))?;
        Ok(created.id)
    }

    async fn poll(&self, api_key: &str, task_id: &str) -> Result<TaskStatus, ProviderFailure> {
        let response = self
            .client
            .get(format!("{}/v1/tasks/{}", self.base_url, task_id))
            .bearer_auth(api_key)
            .header("X-Runway-Version", API_VERSION)
            .send()
            .await
            .map_err(classify_request_error)?;
        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ProviderFailure::transient(format!("malformed Runway status: {}", e)))
    }

    /// Poll until the task succeeds, fails or the wait runs out.
    async fn wait_for_output(&self, api_key: &str, task_id: &str) -> Result<Url, ProviderFailure> {
        let started = Instant::now();

        loop {
            let status = self.poll(api_key, task_id).await?;
            match status.status.as_str() {
                "SUCCEEDED" => {
                    let output = status
                        .output
                        .into_iter()
                        .next()
                        .ok_or_else(|| ProviderFailure::transient("Runway task succeeded without output"))?;
                    return parse_output_url(&output);
                }
                "FAILED" | "CANCELLED" => {
                    return Err(ProviderFailure::permanent(format!(
                        "Runway task {} failed: {}",
                        task_id,
                        status.failure.unwrap_or_else(|| "no reason given".to_string())
                    )));
                }
                other => debug!(task_id, status = other, "Runway task still running"),
            }

            if started.elapsed() + self.poll_interval > self.max_wait {
                return Err(ProviderFailure::transient(format!(
                    "Runway task {} not finished after {}s",
                    task_id,
                    self.max_wait.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Task outputs must be plain HTTP(S) downloads.
fn parse_output_url(raw: &str) -> Result<Url, ProviderFailure> {
    let url = Url::parse(raw)
        .map_err(|e| ProviderFailure::transient(format!("Runway output {} is not a URL: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ProviderFailure::transient(format!("Runway output has unsupported scheme {}", other))),
    }
}

/// Encode an image file as a data URI.
async fn image_data_uri(path: &Path) -> Result<String, ProviderFailure> {
    let bytes = tokio::fs::read(path).await.map_err(io_failure)?;
    let mime = sniff_image_type(&bytes)
        .ok_or_else(|| ProviderFailure::permanent(format!("{} is not a supported image", path.display())))?;
    Ok(format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    ))
}

#[async_trait]
impl ProviderAdapter for RunwayMotion {
    fn provider(&self) -> Provider {
        Provider::Runway
    }

    fn capability(&self) -> Capability {
        Capability::Motion
    }

    async fn invoke(
        &self,
        params: &GenerationParams,
        credential: Option<String>,
        output: &Path,
    ) -> Result<Artifact, ProviderFailure> {
        let GenerationParams::Motion {
            image_path,
            prompt,
            duration_seconds,
        } = params
        else {
            return Err(ProviderFailure::unsupported(params.capability()));
        };
        let api_key = require_credential(credential)?;

        // Runway renders 5 or 10 second clips; the composer trims or loops
        let duration = if *duration_seconds > 5.0 { 10 } else { 5 };
        let body = ImageToVideoRequest {
            model: MODEL,
            prompt_image: image_data_uri(image_path).await?,
            prompt_text: prompt,
            duration,
            ratio: RATIO,
        };

        let task_id = self.submit(&api_key, &body).await?;
        info!(task_id = %task_id, "Runway task submitted");

        let video_url = self.wait_for_output(&api_key, &task_id).await?;
        let response = self
            .client
            .get(video_url)
            .send()
            .await
            .map_err(classify_request_error)?;
        let response = check_status(response).await?;

        Ok(write_response(response, output)
            .await?
            .with_duration(duration as f64)
            .with_metadata("task_id", task_id)
            .with_metadata("model", MODEL))
    }
}
