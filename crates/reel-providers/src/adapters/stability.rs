//! Stability AI SDXL text-to-image.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use reel_models::{Capability, Provider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{check_status, classify_request_error, trim_base, write_bytes};
use crate::adapter::{require_credential, ProviderAdapter};
use crate::error::ProviderFailure;
use crate::outcome::Artifact;
use crate::request::GenerationParams;

pub const STABILITY_BASE_URL: &str = "https://api.stability.ai";

const ENGINE: &str = "stable-diffusion-xl-1024-v1-0";

/// Dimensions the SDXL engine accepts.
const SDXL_SIZES: [(u32, u32); 9] = [
    (1024, 1024),
    (1152, 896),
    (1216, 832),
    (1344, 768),
    (1536, 640),
    (640, 1536),
    (768, 1344),
    (832, 1216),
    (896, 1152),
];

#[derive(Debug, Serialize)]
struct TextToImageRequest<'a> {
    text_prompts: Vec<TextPrompt<'a>>,
    cfg_scale: u32,
    height: u32,
    width: u32,
    samples: u32,
    steps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct TextPrompt<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TextToImageResponse {
    artifacts: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    base64: String,
    #[serde(default)]
    seed: Option<u64>,
}

pub struct StabilityImage {
    client: Client,
    base_url: String,
}

impl StabilityImage {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, STABILITY_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
        }
    }
}

/// SDXL size with the aspect ratio closest to the requested one.
pub fn sdxl_size(width: u32, height: u32) -> (u32, u32) {
    let target = width.max(1) as f64 / height.max(1) as f64;
    SDXL_SIZES
        .iter()
        .copied()
        .min_by(|a, b| {
            let da = (a.0 as f64 / a.1 as f64 - target).abs();
            let db = (b.0 as f64 / b.1 as f64 - target).abs();
            da.total_cmp(&db)
        })
        .unwrap_or((1024, 1024))
}

#[async_trait]
impl ProviderAdapter for StabilityImage {
    fn provider(&self) -> Provider {
        Provider::Stability
    }

    fn capability(&self) -> Capability {
        Capability::Image
    }

    async fn invoke(
        &self,
        params: &GenerationParams,
        credential: Option<String>,
        output: &Path,
    ) -> Result<Artifact, ProviderFailure> {
        let GenerationParams::Image {
            prompt,
            width,
            height,
            seed,
        } = params
        else {
            return Err(ProviderFailure::unsupported(params.capability()));
        };
        let api_key = require_credential(credential)?;

        let (width, height) = sdxl_size(*width, *height);
        let body = TextToImageRequest {
            text_prompts: vec![TextPrompt { text: prompt }],
            cfg_scale: 7,
            height,
            width,
            samples: 1,
            steps: 30,
            seed: *seed,
        };

        debug!("Requesting Stability image ({}x{})", width, height);
        let response = self
            .client
            .post(format!("{}/v1/generation/{}/text-to-image", self.base_url, ENGINE))
            .bearer_auth(api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(classify_request_error)?;
        let response = check_status(response).await?;

        let parsed: TextToImageResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::transient(format!("malformed Stability response: {}", e)))?;
        let image = parsed
            .artifacts
            .into_iter()
            .next()
            .ok_or_else(|| ProviderFailure::transient("Stability returned no artifacts"))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(image.base64.as_bytes())
            .map_err(|e| ProviderFailure::transient(format!("invalid base64 image: {}", e)))?;

        let artifact = write_bytes(output, &bytes)
            .await?
            .with_content_type("image/png")
            .with_metadata("engine", ENGINE);
        Ok(match image.seed {
            Some(seed) => artifact.with_metadata("seed", seed.to_string()),
            None => artifact,
        })
    }
}
