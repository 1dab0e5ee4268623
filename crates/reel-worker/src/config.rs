//! Worker configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `REEL_*` environment variables (`REEL_BUFFER_SECONDS=0.75`,
//! `REEL_IMAGE_PROVIDERS=stability,pollinations`, `REEL_RENDER__FPS=30`,
//! `REEL_VOICES__ELEVENLABS=21m00Tcm4TlvDq8ikWAM`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use reel_models::{Provider, ProviderPreferences, RenderConfig};
use reel_providers::{AdapterSettings, ChainPolicy, ProviderLimits};
use serde::{Deserialize, Serialize};

use crate::error::{WorkerError, WorkerResult};

const ENV_PREFIX: &str = "REEL";

/// Worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// Maximum scenes generated in parallel
    pub max_scene_parallel: usize,
    /// In-flight requests per provider
    pub provider_concurrency: usize,
    pub provider_requests_per_minute: u32,
    /// Silence kept after narration, in seconds
    pub buffer_seconds: f64,
    /// Duration of scenes whose script does not state one
    pub default_scene_duration: f64,
    pub fade_seconds: f64,
    /// Music volume without narration
    pub music_volume: f64,
    /// Music volume under narration
    pub music_volume_with_narration: f64,
    /// Attempts per provider
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub server_error_delay_secs: u64,
    pub attempt_timeout_secs: u64,
    pub motion_max_wait_secs: u64,
    pub motion_poll_interval_secs: u64,
    /// Continue into the capability ranking after requested providers
    pub use_full_ranking: bool,
    pub script_providers: Vec<Provider>,
    pub image_providers: Vec<Provider>,
    pub voice_providers: Vec<Provider>,
    pub motion_providers: Vec<Provider>,
    /// Voice id per voice provider, e.g. `elevenlabs = "21m00Tcm4TlvDq8ikWAM"`
    pub voices: BTreeMap<Provider, String>,
    /// Narration language code
    pub language: String,
    /// Request image-to-video clips for every scene
    pub enable_motion: bool,
    pub render: RenderConfig,
    /// FFmpeg timeout per invocation
    pub render_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/reel"),
            max_scene_parallel: 4,
            provider_concurrency: 2,
            provider_requests_per_minute: 60,
            buffer_seconds: 0.5,
            default_scene_duration: reel_models::scene::DEFAULT_SCENE_DURATION,
            fade_seconds: reel_media::DEFAULT_FADE_SECONDS,
            music_volume: 0.5,
            music_volume_with_narration: 0.3,
            max_retries: 3,
            retry_delay_secs: 5,
            server_error_delay_secs: 10,
            attempt_timeout_secs: 60,
            motion_max_wait_secs: 300,
            motion_poll_interval_secs: 10,
            use_full_ranking: false,
            script_providers: Vec::new(),
            image_providers: Vec::new(),
            voice_providers: Vec::new(),
            motion_providers: Vec::new(),
            voices: BTreeMap::new(),
            language: "en".to_string(),
            enable_motion: false,
            render: RenderConfig::default(),
            render_timeout_secs: 1800,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::load(None)
    }

    /// Load defaults, then `file` if given, then the environment.
    pub fn load(file: Option<&Path>) -> WorkerResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("script_providers")
                    .with_list_parse_key("image_providers")
                    .with_list_parse_key("voice_providers")
                    .with_list_parse_key("motion_providers"),
            )
            .build()
            .map_err(|e| WorkerError::config_error(e.to_string()))?;

        let config: WorkerConfig = settings
            .try_deserialize()
            .map_err(|e| WorkerError::config_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> WorkerResult<()> {
        if !(self.buffer_seconds.is_finite() && self.buffer_seconds >= 0.0) {
            return Err(WorkerError::config_error(format!(
                "buffer_seconds must be >= 0, got {}",
                self.buffer_seconds
            )));
        }
        if !(self.default_scene_duration.is_finite() && self.default_scene_duration > 0.0) {
            return Err(WorkerError::config_error(format!(
                "default_scene_duration must be > 0, got {}",
                self.default_scene_duration
            )));
        }
        for (name, volume) in [
            ("music_volume", self.music_volume),
            ("music_volume_with_narration", self.music_volume_with_narration),
        ] {
            if !(0.0..=1.0).contains(&volume) {
                return Err(WorkerError::config_error(format!("{} must be within 0..=1, got {}", name, volume)));
            }
        }
        if self.render.width == 0 || self.render.height == 0 || self.render.fps == 0 {
            return Err(WorkerError::config_error("render size and fps must be positive"));
        }
        Ok(())
    }

    /// Caller preferences from the configured provider lists.
    pub fn preferences(&self) -> ProviderPreferences {
        ProviderPreferences {
            script: self.script_providers.clone(),
            image: self.image_providers.clone(),
            voice: self.voice_providers.clone(),
            motion: self.motion_providers.clone(),
            use_full_ranking: self.use_full_ranking,
        }
    }

    pub fn chain_policy(&self) -> ChainPolicy {
        ChainPolicy::default()
            .with_retry_delays(
                Duration::from_secs(self.retry_delay_secs),
                Duration::from_secs(self.server_error_delay_secs),
            )
            .with_default_timeout(Duration::from_secs(self.attempt_timeout_secs))
            .with_attempt_timeout(
                Provider::Runway,
                Duration::from_secs(self.motion_max_wait_secs + self.attempt_timeout_secs),
            )
    }

    pub fn provider_limits(&self) -> ProviderLimits {
        ProviderLimits::new(self.provider_concurrency, self.provider_requests_per_minute)
    }

    pub fn adapter_settings(&self) -> AdapterSettings {
        AdapterSettings {
            motion_poll_interval: Duration::from_secs(self.motion_poll_interval_secs),
            motion_max_wait: Duration::from_secs(self.motion_max_wait_secs),
        }
    }

    /// HTTP client timeout, long enough for the slowest provider.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs.max(1))
    }

    /// Music volume for a timeline with or without narration.
    pub fn music_volume_for(&self, has_narration: bool) -> f64 {
        if has_narration {
            self.music_volume_with_narration
        } else {
            self.music_volume
        }
    }
}
