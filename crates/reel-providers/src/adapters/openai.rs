//! OpenAI images, speech and chat-based script generation.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use reel_models::{Capability, Provider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{check_status, classify_request_error, trim_base, write_bytes, write_response};
use super::script_prompt;
use crate::adapter::{require_credential, ProviderAdapter};
use crate::error::ProviderFailure;
use crate::outcome::Artifact;
use crate::request::GenerationParams;
use crate::script::{scenes_from_reply, write_script};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

const IMAGE_MODEL: &str = "dall-e-3";
const SPEECH_MODEL: &str = "tts-1";
const DEFAULT_VOICE: &str = "alloy";
const CHAT_MODEL: &str = "gpt-4o-mini";

/// Endpoint and client shared by the OpenAI adapters.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, OPENAI_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
        }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        api_key: &str,
        body: &T,
    ) -> Result<reqwest::Response, ProviderFailure> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(classify_request_error)?;
        check_status(response).await
    }
}

/// DALL-E size closest to the requested orientation.
pub fn dalle_size(width: u32, height: u32) -> &'static str {
    if width > height {
        "1792x1024"
    } else if height > width {
        "1024x1792"
    } else {
        "1024x1024"
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    revised_prompt: Option<String>,
}

pub struct OpenAiImage {
    api: OpenAiClient,
}

impl OpenAiImage {
    pub fn new(api: OpenAiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiImage {
    fn provider(&self) -> Provider {
        Provider::OpenAi
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

        let body = ImageRequest {
            model: IMAGE_MODEL,
            prompt,
            n: 1,
            size: dalle_size(*width, *height),
            response_format: "b64_json",
        };
        let response = self.api.post("/v1/images/generations", &api_key, &body).await?;
        let parsed: ImageResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::transient(format!("malformed OpenAI image response: {}", e)))?;

        let image = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderFailure::transient("OpenAI returned no image"))?;
        let encoded = image
            .b64_json
            .ok_or_else(|| ProviderFailure::transient("OpenAI image has no b64_json"))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| ProviderFailure::transient(format!("invalid base64 image: {}", e)))?;

        let artifact = write_bytes(output, &bytes)
            .await?
            .with_content_type("image/png")
            .with_metadata("model", IMAGE_MODEL);
        Ok(match image.revised_prompt {
            Some(revised) => artifact.with_metadata("revised_prompt", revised),
            None => artifact,
        })
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

pub struct OpenAiSpeech {
    api: OpenAiClient,
}

impl OpenAiSpeech {
    pub fn new(api: OpenAiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiSpeech {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn capability(&self) -> Capability {
        Capability::Voice
    }

    async fn invoke(
        &self,
        params: &GenerationParams,
        credential: Option<String>,
        output: &Path,
    ) -> Result<Artifact, ProviderFailure> {
        let GenerationParams::Voice { text, .. } = params else {
            return Err(ProviderFailure::unsupported(params.capability()));
        };
        let api_key = require_credential(credential)?;

        let voice = params.voice_for(Provider::OpenAi).unwrap_or(DEFAULT_VOICE);
        let body = SpeechRequest {
            model: SPEECH_MODEL,
            input: text,
            voice,
            response_format: "mp3",
        };
        debug!("Requesting OpenAI speech ({} chars, voice {})", text.len(), voice);

        let response = self.api.post("/v1/audio/speech", &api_key, &body).await?;
        Ok(write_response(response, output)
            .await?
            .with_metadata("model", SPEECH_MODEL)
            .with_metadata("voice", voice))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct OpenAiScript {
    api: OpenAiClient,
}

impl OpenAiScript {
    pub fn new(api: OpenAiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiScript {
    fn provider(&self) -> Provider {
        Provider::OpenAi
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

        let instructions = script_prompt(prompt, *scene_count, *default_duration);
        let body = ChatRequest {
            model: CHAT_MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a screenwriter for short narrated videos. Reply with JSON only.",
                },
                ChatMessage {
                    role: "user",
                    content: &instructions,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: 0.7,
        };

        let response = self.api.post("/v1/chat/completions", &api_key, &body).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::transient(format!("malformed OpenAI chat response: {}", e)))?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderFailure::transient("OpenAI returned no script"))?;

        let scenes = scenes_from_reply(&reply, prompt, *scene_count, *default_duration)?;
        Ok(write_script(output, &scenes)
            .await?
            .with_metadata("model", CHAT_MODEL))
    }
}
