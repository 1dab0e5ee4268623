//! Generation requests handed to the provider chain.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use reel_models::{Capability, Provider};

use crate::policy::DEFAULT_MAX_RETRIES;

/// Capability-specific generation inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationParams {
    Script {
        prompt: String,
        scene_count: u32,
        /// Duration given to scenes that do not state one
        default_duration: f64,
    },
    Image {
        prompt: String,
        width: u32,
        height: u32,
        seed: Option<u64>,
    },
    Voice {
        text: String,
        /// Voice id per provider; a provider without an entry uses its default
        voices: BTreeMap<Provider, String>,
        language: String,
    },
    Motion {
        image_path: PathBuf,
        prompt: String,
        duration_seconds: f64,
    },
}

impl GenerationParams {
    pub fn capability(&self) -> Capability {
        match self {
            GenerationParams::Script { .. } => Capability::Script,
            GenerationParams::Image { .. } => Capability::Image,
            GenerationParams::Voice { .. } => Capability::Voice,
            GenerationParams::Motion { .. } => Capability::Motion,
        }
    }

    /// Voice id configured for `provider`, if any.
    pub fn voice_for(&self, provider: Provider) -> Option<&str> {
        match self {
            GenerationParams::Voice { voices, .. } => voices.get(&provider).map(String::as_str),
            _ => None,
        }
    }
}

/// One request to the chain.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub params: GenerationParams,
    /// Providers asked for by the caller, tried first and in order
    pub providers: Vec<Provider>,
    /// Continue into the capability ranking after the requested providers
    pub use_full_ranking: bool,
    /// Attempts per provider
    pub max_retries: u32,
    /// Overrides the per-provider attempt timeout
    pub attempt_timeout: Option<Duration>,
    /// Where the accepted artifact ends up
    pub output_path: PathBuf,
}

impl GenerationRequest {
    pub fn new(params: GenerationParams, output_path: impl Into<PathBuf>) -> Self {
        Self {
            params,
            providers: Vec::new(),
            use_full_ranking: false,
            max_retries: DEFAULT_MAX_RETRIES,
            attempt_timeout: None,
            output_path: output_path.into(),
        }
    }

    pub fn with_providers(mut self, providers: impl IntoIterator<Item = Provider>) -> Self {
        self.providers = providers.into_iter().collect();
        self
    }

    pub fn with_full_ranking(mut self, enabled: bool) -> Self {
        self.use_full_ranking = enabled;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn capability(&self) -> Capability {
        self.params.capability()
    }
}
