//! Pollinations free image generation.

use std::path::Path;

use async_trait::async_trait;
use reel_models::{Capability, Provider};
use reqwest::Client;
use tracing::debug;

use super::http::{check_status, classify_request_error, trim_base, write_response};
use crate::adapter::ProviderAdapter;
use crate::error::ProviderFailure;
use crate::outcome::Artifact;
use crate::request::GenerationParams;

pub const POLLINATIONS_BASE_URL: &str = "https://image.pollinations.ai";

/// Longest prompt sent; longer prompts time out upstream.
const MAX_PROMPT_CHARS: usize = 500;

const QUALITY_KEYWORDS: [&str; 6] = [
    "high quality",
    "detailed",
    "professional",
    "sharp focus",
    "8k",
    "masterpiece",
];

/// Appended keywords per prompt.
const MAX_KEYWORDS: usize = 4;

pub struct PollinationsImage {
    client: Client,
    base_url: String,
    model: Option<String>,
}

impl PollinationsImage {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, POLLINATIONS_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
            model: None,
        }
    }

    /// Pin a Pollinations model (`flux`, `turbo`...).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn request_url(&self, prompt: &str, width: u32, height: u32, seed: Option<u64>) -> String {
        let mut url = format!(
            "{}/prompt/{}?width={}&height={}&nologo=true",
            self.base_url,
            urlencoding::encode(&enhance_prompt(prompt)),
            width,
            height
        );
        if let Some(seed) = seed {
            url.push_str(&format!("&seed={}", seed));
        }
        if let Some(model) = &self.model {
            url.push_str(&format!("&model={}", urlencoding::encode(model)));
        }
        url
    }
}

/// Add missing quality keywords and cap the prompt length.
pub fn enhance_prompt(prompt: &str) -> String {
    let lower = prompt.to_lowercase();
    let mut enhanced = prompt.trim().to_string();

    for keyword in QUALITY_KEYWORDS
        .iter()
        .filter(|k| !lower.contains(*k))
        .take(MAX_KEYWORDS)
    {
        enhanced.push_str(", ");
        enhanced.push_str(keyword);
    }

    match enhanced.char_indices().nth(MAX_PROMPT_CHARS) {
        Some((cut, _)) => enhanced[..cut].to_string(),
        None => enhanced,
    }
}

#[async_trait]
impl ProviderAdapter for PollinationsImage {
    fn provider(&self) -> Provider {
        Provider::Pollinations
    }

    fn capability(&self) -> Capability {
        Capability::Image
    }

    async fn invoke(
        &self,
        params: &GenerationParams,
        _credential: Option<String>,
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

        let url = self.request_url(prompt, *width, *height, *seed);
        debug!("Requesting Pollinations image ({}x{})", width, height);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_request_error)?;
        let response = check_status(response).await?;

        let artifact = write_response(response, output).await?;
        match artifact.content_type.as_deref() {
            Some(ct) if ct.starts_with("image/") => Ok(artifact.with_metadata("url", url)),
            other => Err(ProviderFailure::transient(format!(
                "unexpected content type {}",
                other.unwrap_or("(none)")
            ))),
        }
    }
}
