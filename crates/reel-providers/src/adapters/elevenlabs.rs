//! ElevenLabs text-to-speech.

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

pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// "Rachel", a stock narration voice.
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

const MODEL_ID: &str = "eleven_multilingual_v2";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

pub struct ElevenLabsVoice {
    client: Client,
    base_url: String,
}

impl ElevenLabsVoice {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, ELEVENLABS_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
        }
    }
}

#[async_trait]
impl ProviderAdapter for ElevenLabsVoice {
    fn provider(&self) -> Provider {
        Provider::ElevenLabs
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
        let voice_id = params.voice_for(Provider::ElevenLabs).unwrap_or(DEFAULT_VOICE_ID);

        let body = SpeechRequest {
            text,
            model_id: MODEL_ID,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/text-to-speech/{}", self.base_url, voice_id))
            .header("xi-api-key", api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(classify_request_error)?;
        let response = check_status(response).await?;

        Ok(write_response(response, output)
            .await?
            .with_metadata("model", MODEL_ID)
            .with_metadata("voice", voice_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_uses_default_voice_and_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/text-to-speech/{}", DEFAULT_VOICE_ID)))
            .and(header("xi-api-key", "el-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "audio/mpeg")
                    .set_body_bytes(vec![0xFF, 0xFB, 0x90, 0x64]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let adapter = ElevenLabsVoice::with_base_url(Client::new(), server.uri());
        let params = GenerationParams::Voice {
            text: "Night falls.".to_string(),
            voices: BTreeMap::new(),
            language: "en".to_string(),
        };

        let artifact = adapter
            .invoke(&params, Some("el-key".to_string()), &dir.path().join("voice.mp3"))
            .await
            .unwrap();
        assert_eq!(artifact.metadata.get("voice").map(String::as_str), Some(DEFAULT_VOICE_ID));
    }

    #[tokio::test]
    async fn test_quota_exceeded_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"detail":{"status":"quota_exceeded"}}"#))
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let adapter = ElevenLabsVoice::with_base_url(Client::new(), server.uri());
        let params = GenerationParams::Voice {
            text: "Night falls.".to_string(),
            voices: BTreeMap::from([(Provider::ElevenLabs, "custom".to_string())]),
            language: "en".to_string(),
        };

        let failure = adapter
            .invoke(&params, Some("el-key".to_string()), &dir.path().join("voice.mp3"))
            .await
            .unwrap_err();
        assert!(failure.is_permanent());
    }
}
