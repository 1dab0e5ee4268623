//! Adapter lookup by capability and provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reel_models::{Capability, Provider};
use reqwest::Client;

use crate::adapter::ProviderAdapter;
use crate::adapters::{
    ElevenLabsVoice, GeminiScript, GttsVoice, HuggingFaceImage, OpenAiClient, OpenAiImage, OpenAiScript,
    OpenAiSpeech, PollinationsImage, RunwayMotion, StabilityImage, TemplateScript,
};
use crate::policy::{MOTION_MAX_WAIT, MOTION_POLL_INTERVAL};

/// Settings for the built-in adapters.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub motion_poll_interval: Duration,
    pub motion_max_wait: Duration,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            motion_poll_interval: MOTION_POLL_INTERVAL,
            motion_max_wait: MOTION_MAX_WAIT,
        }
    }
}

/// Registered adapters keyed by `(capability, provider)`.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<(Capability, Provider), Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter sharing one HTTP client.
    pub fn with_defaults(client: Client, settings: &AdapterSettings) -> Self {
        let openai = OpenAiClient::new(client.clone());

        Self::new()
            .with(TemplateScript)
            .with(OpenAiScript::new(openai.clone()))
            .with(GeminiScript::new(client.clone()))
            .with(StabilityImage::new(client.clone()))
            .with(OpenAiImage::new(openai.clone()))
            .with(HuggingFaceImage::new(client.clone()))
            .with(PollinationsImage::new(client.clone()))
            .with(ElevenLabsVoice::new(client.clone()))
            .with(OpenAiSpeech::new(openai))
            .with(GttsVoice::new(client.clone()))
            .with(
                RunwayMotion::new(client).with_polling(settings.motion_poll_interval, settings.motion_max_wait),
            )
    }

    /// Register an adapter, replacing any previous one for the same key.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters
            .insert((adapter.capability(), adapter.provider()), adapter);
    }

    pub fn with(mut self, adapter: impl ProviderAdapter + 'static) -> Self {
        self.register(Arc::new(adapter));
        self
    }

    pub fn get(&self, capability: Capability, provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&(capability, provider)).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
