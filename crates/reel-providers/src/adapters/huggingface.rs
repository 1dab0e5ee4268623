//! HuggingFace inference API image generation.

use std::path::Path;

use async_trait::async_trait;
use reel_models::{Capability, Provider};
use reqwest::Client;
use serde::Serialize;

use super::http::{check_status, classify_request_error, trim_base, write_response};
use crate::adapter::{require_credential, ProviderAdapter};
use crate::error::ProviderFailure;
use crate::outcome::Artifact;
use crate::request::GenerationParams;

pub const HUGGINGFACE_BASE_URL: &str = "https://api-inference.huggingface.co";

const MODEL_ID: &str = "stabilityai/stable-diffusion-2-1";

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    /// Block until a cold model is loaded instead of returning 503
    wait_for_model: bool,
}

pub struct HuggingFaceImage {
    client: Client,
    base_url: String,
}

impl HuggingFaceImage {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, HUGGINGFACE_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
        }
    }
}

#[async_trait]
impl ProviderAdapter for HuggingFaceImage {
    fn provider(&self) -> Provider {
        Provider::HuggingFace
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
            ..
        } = params
        else {
            return Err(ProviderFailure::unsupported(params.capability()));
        };
        let api_key = require_credential(credential)?;

        // SD 2.1 works at 768px; larger requests are scaled down
        let scale = (768.0 / (*width).max(*height).max(1) as f64).min(1.0);
        let to_multiple_of_8 = |v: u32| (((v as f64 * scale) as u32) / 8 * 8).max(64);

        let body = InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                width: to_multiple_of_8(*width),
                height: to_multiple_of_8(*height),
            },
            options: InferenceOptions { wait_for_model: true },
        };

        let response = self
            .client
            .post(format!("{}/models/{}", self.base_url, MODEL_ID))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_request_error)?;
        let response = check_status(response).await?;

        Ok(write_response(response, output)
            .await?
            .with_metadata("model", MODEL_ID))
    }
}
