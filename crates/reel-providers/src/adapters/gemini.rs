//! Gemini script generation.
//!
//! Sends the screenwriting prompt to `generateContent` with a JSON response
//! type and normalizes the returned scenes.

use std::path::Path;

use async_trait::async_trait;
use reel_models::{Capability, Provider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::http::{check_status, classify_request_error, trim_base};
use super::script_prompt;
use crate::adapter::{require_credential, ProviderAdapter};
use crate::error::ProviderFailure;
use crate::outcome::Artifact;
use crate::request::GenerationParams;
use crate::script::{scenes_from_reply, write_script};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

pub struct GeminiScript {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiScript {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, GEMINI_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
            model: GEMINI_MODEL.to_string(),
        }
    }

    /// Call Gemini and return the first candidate's text.
    async fn generate(&self, api_key: &str, prompt: String) -> Result<String, ProviderFailure> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(classify_request_error)?;
        let response = check_status(response).await?;

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::transient(format!("Failed to parse Gemini response: {}", e)))?;

        gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ProviderFailure::transient("No content in Gemini response"))
    }
}

#[async_trait]
impl ProviderAdapter for GeminiScript {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn capability(&self) -> Capability {
        Capability::Script
    }

    async fn invoke(
        &self,
        params: &GenerationParams,
        credential: Option<String>,
        output: &Path,
    ) -> Result<Artifact, ProviderFailure> {
        let GenerationParams::Script {
            prompt,
            scene_count,
            default_duration,
        } = params
        else {
            return Err(ProviderFailure::unsupported(params.capability()));
        };
        let api_key = require_credential(credential)?;

        info!("Generating {}-scene script with {}", scene_count, self.model);
        let text = self
            .generate(&api_key, script_prompt(prompt, *scene_count, *default_duration))
            .await?;
        debug!("Gemini replied with {} chars", text.len());

        let scenes = scenes_from_reply(&text, prompt, *scene_count, *default_duration)?;
        Ok(write_script(output, &scenes)
            .await?
            .with_metadata("model", self.model.clone()))
    }
}
