//! Free Google Translate text-to-speech.
//!
//! The endpoint reads at most 200 characters per request, so longer text is
//! split on word boundaries and the returned MP3 frames are appended into a
//! single file.

use std::path::Path;

use async_trait::async_trait;
use reel_models::{Capability, Provider};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::http::{check_status, classify_request_error, io_failure, trim_base};
use crate::adapter::ProviderAdapter;
use crate::error::ProviderFailure;
use crate::outcome::Artifact;
use crate::request::GenerationParams;

pub const GTTS_BASE_URL: &str = "https://translate.google.com";

const MAX_CHUNK_CHARS: usize = 200;

pub struct GttsVoice {
    client: Client,
    base_url: String,
}

impl GttsVoice {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, GTTS_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
        }
    }

    async fn fetch_chunk(&self, chunk: &str, index: usize, total: usize, language: &str) -> Result<Vec<u8>, ProviderFailure> {
        let idx = index.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();
        let response = self
            .client
            .get(format!("{}/translate_tts", self.base_url))
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", language),
                ("q", chunk),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await
            .map_err(classify_request_error)?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await.map_err(classify_request_error)?;
        Ok(bytes.to_vec())
    }
}

/// Split text into chunks of at most `MAX_CHUNK_CHARS`, preferring
/// sentence ends and then word boundaries.
pub fn chunk_text(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() { 0 } else { 1 } + word.chars().count();
        if current.chars().count() + needed > MAX_CHUNK_CHARS && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if word.chars().count() > MAX_CHUNK_CHARS {
            // A single overlong token is hard-split
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(MAX_CHUNK_CHARS) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);

        // Close the chunk at a sentence end once it is reasonably full
        if current.chars().count() > MAX_CHUNK_CHARS / 2 && word.ends_with(['.', '!', '?']) {
            chunks.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl ProviderAdapter for GttsVoice {
    fn provider(&self) -> Provider {
        Provider::Gtts
    }

    fn capability(&self) -> Capability {
        Capability::Voice
    }

    async fn invoke(
        &self,
        params: &GenerationParams,
        _credential: Option<String>,
        output: &Path,
    ) -> Result<Artifact, ProviderFailure> {
        let GenerationParams::Voice { text, language, .. } = params else {
            return Err(ProviderFailure::unsupported(params.capability()));
        };

        let chunks = chunk_text(text);
        if chunks.is_empty() {
            return Err(ProviderFailure::permanent("no text to speak"));
        }
        debug!("gTTS speaking {} chunk(s) in {}", chunks.len(), language);

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_failure)?;
        }
        let mut file = tokio::fs::File::create(output).await.map_err(io_failure)?;
        let mut written = 0u64;

        for (index, chunk) in chunks.iter().enumerate() {
            let bytes = self.fetch_chunk(chunk, index, chunks.len(), language).await?;
            file.write_all(&bytes).await.map_err(io_failure)?;
            written += bytes.len() as u64;
        }
        file.flush().await.map_err(io_failure)?;

        Ok(Artifact::new(output, written)
            .with_content_type("audio/mpeg")
            .with_metadata("chunks", chunks.len().to_string())
            .with_metadata("language", language.clone()))
    }
}
