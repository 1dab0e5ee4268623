//! Per-scene media acquisition.
//!
//! One image per scene, always. One narration track only when the scene has
//! narration text. Image and voice requests are independent and run
//! concurrently; the optional motion clip needs the image and runs after it.
//!
//! Failure semantics differ by capability: without an image a scene cannot
//! render, so image exhaustion aborts the run. Voice exhaustion degrades the
//! scene to a silent one at its requested duration and is reported as a
//! warning. Motion exhaustion falls back to the still image.

use std::collections::BTreeMap;
use std::path::PathBuf;

use reel_media::unique_scene_path;
use reel_models::{Capability, MediaAsset, MediaKind, Provider, ProviderPreferences, Scene};
use reel_providers::policy::DEFAULT_MAX_RETRIES;
use reel_providers::{ChainError, ChainSuccess, GenerationParams, GenerationRequest, ProviderAttempts, ProviderChain};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::state::SceneState;

/// How one capability's chain is run.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    /// Requested providers, empty for the capability ranking
    pub providers: Vec<Provider>,
    pub use_full_ranking: bool,
    /// Attempts per provider
    pub max_retries: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            use_full_ranking: false,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ChainConfig {
    pub fn from_preferences(preferences: &ProviderPreferences, capability: Capability, max_retries: u32) -> Self {
        Self {
            providers: preferences.for_capability(capability).to_vec(),
            use_full_ranking: preferences.use_full_ranking,
            max_retries,
        }
    }

    /// Chain request for `params` ending up at `output`.
    pub fn request(&self, params: GenerationParams, output: impl Into<PathBuf>) -> GenerationRequest {
        GenerationRequest::new(params, output)
            .with_providers(self.providers.iter().copied())
            .with_full_ranking(self.use_full_ranking)
            .with_max_retries(self.max_retries)
    }
}

/// Inputs shared by every scene of a run.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub work_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Voice id per voice provider
    pub voices: BTreeMap<Provider, String>,
    pub language: String,
}

/// Why a narrated scene has no narration track.
#[derive(Debug, Clone)]
pub struct DegradedNarration {
    pub reason: String,
    /// Every voice provider tried, in order
    pub ledger: Vec<ProviderAttempts>,
}

impl From<ChainError> for DegradedNarration {
    fn from(err: ChainError) -> Self {
        Self {
            reason: err.to_string(),
            ledger: err.attempts().to_vec(),
        }
    }
}

/// Media acquired for one scene.
#[derive(Debug, Clone)]
pub struct SceneMedia {
    pub scene: Scene,
    pub image: MediaAsset,
    pub audio: Option<MediaAsset>,
    pub motion: Option<MediaAsset>,
    pub state: SceneState,
    /// Set when the scene has narration text but no narration track
    pub audio_failure: Option<DegradedNarration>,
}

impl SceneMedia {
    /// Scene rendered silent because voice generation failed.
    pub fn is_degraded(&self) -> bool {
        self.audio_failure.is_some()
    }

    pub fn assets(&self) -> Vec<MediaAsset> {
        std::iter::once(self.image.clone())
            .chain(self.audio.clone())
            .chain(self.motion.clone())
            .collect()
    }
}

#[derive(Clone)]
pub struct SceneMediaGenerator {
    chain: ProviderChain,
    settings: GeneratorSettings,
}

impl SceneMediaGenerator {
    pub fn new(chain: ProviderChain, settings: GeneratorSettings) -> Self {
        Self { chain, settings }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Acquire the image, narration and optional motion clip for `scene`.
    ///
    /// Pass `motion` only when motion clips are wanted.
    pub async fn generate(
        &self,
        scene: &Scene,
        image: &ChainConfig,
        voice: &ChainConfig,
        motion: Option<&ChainConfig>,
    ) -> WorkerResult<SceneMedia> {
        let work_dir = &self.settings.work_dir;
        let image_path = unique_scene_path(work_dir, scene.index, "image", Capability::Image.extension());
        if let Some(scene_dir) = image_path.parent() {
            fs::create_dir_all(scene_dir).await?;
        }

        let mut state = SceneState::Pending.advance(SceneState::ImageGenerating)?;

        let image_request = image.request(
            GenerationParams::Image {
                prompt: scene.image_prompt.clone(),
                width: self.settings.width,
                height: self.settings.height,
                seed: None,
            },
            image_path,
        );
        let voice_request = scene.has_narration().then(|| {
            voice.request(
                GenerationParams::Voice {
                    text: scene.narration_text.clone(),
                    voices: self.settings.voices.clone(),
                    language: self.settings.language.clone(),
                },
                unique_scene_path(work_dir, scene.index, "voice", Capability::Voice.extension()),
            )
        });

        let (image_result, voice_result) = tokio::join!(self.chain.execute(&image_request), async {
            match &voice_request {
                Some(request) => Some(self.chain.execute(request).await),
                None => None,
            }
        });

        let image = match image_result {
            Ok(success) => to_asset(scene.index, MediaKind::Image, success),
            Err(err) => {
                if let Some(Ok(voice)) = &voice_result {
                    let _ = fs::remove_file(voice.path()).await;
                }
                return Err(WorkerError::image_exhausted(scene.index, err));
            }
        };
        state = state.advance(SceneState::ImageReady)?;

        let mut audio_failure = None;
        let audio = match voice_result {
            None => {
                debug!(scene_index = scene.index, "No narration, skipping voice generation");
                None
            }
            Some(result) => {
                state = state.advance(SceneState::AudioGenerating)?;
                match result {
                    Ok(success) => Some(to_asset(scene.index, MediaKind::Audio, success)),
                    Err(err) => {
                        metrics::record_scene_degraded();
                        audio_failure = Some(DegradedNarration::from(err));
                        None
                    }
                }
            }
        };

        let motion = match motion {
            Some(config) => self.generate_motion(scene, &image, audio.as_ref(), config).await,
            None => None,
        };

        info!(
            scene_index = scene.index,
            image_provider = ?image.provider,
            voice_provider = ?audio.as_ref().and_then(|a| a.provider),
            audio_seconds = ?audio.as_ref().and_then(|a| a.duration_seconds),
            motion = motion.is_some(),
            "Scene media ready"
        );

        Ok(SceneMedia {
            scene: scene.clone(),
            image,
            audio,
            motion,
            state,
            audio_failure,
        })
    }

    async fn generate_motion(
        &self,
        scene: &Scene,
        image: &MediaAsset,
        audio: Option<&MediaAsset>,
        config: &ChainConfig,
    ) -> Option<MediaAsset> {
        let duration_seconds = audio
            .and_then(|a| a.duration_seconds)
            .unwrap_or(scene.requested_duration);
        let request = config.request(
            GenerationParams::Motion {
                image_path: image.path.clone(),
                prompt: scene.image_prompt.clone(),
                duration_seconds,
            },
            unique_scene_path(&self.settings.work_dir, scene.index, "motion", Capability::Motion.extension()),
        );

        match self.chain.execute(&request).await {
            Ok(success) => Some(to_asset(scene.index, MediaKind::Video, success)),
            Err(err) => {
                warn!(
                    scene_index = scene.index,
                    capability = %Capability::Motion,
                    "Motion clip unavailable, using still image: {}",
                    err
                );
                None
            }
        }
    }
}

fn to_asset(scene_index: u32, kind: MediaKind, success: ChainSuccess) -> MediaAsset {
    if !success.failures.is_empty() {
        debug!(
            scene_index,
            kind = kind.as_str(),
            provider = %success.provider,
            failed_providers = success.failures.len(),
            "Accepted after fallback"
        );
    }
    let asset = MediaAsset::new(scene_index, kind, success.artifact.path, success.artifact.size_bytes)
        .with_provider(success.provider);
    match success.artifact.duration_seconds {
        Some(seconds) => asset.with_duration(seconds),
        None => asset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chain, FakeAdapter};
    use reel_providers::{AdapterRegistry, ProviderFailure};
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> GeneratorSettings {
        GeneratorSettings {
            work_dir: dir.path().to_path_buf(),
            width: 1920,
            height: 1080,
            voices: BTreeMap::new(),
            language: "en".to_string(),
        }
    }

    fn narrated(index: u32, text: &str) -> Scene {
        Scene::new(index, format!("Scene {}", index), "a lighthouse at dusk").with_narration(text)
    }

    #[tokio::test]
    async fn test_narrated_scene_gets_image_and_audio() {
        let dir = TempDir::new().unwrap();
        let registry = AdapterRegistry::new()
            .with(FakeAdapter::ok(Provider::Pollinations, Capability::Image))
            .with(FakeAdapter::ok(Provider::Gtts, Capability::Voice).with_duration("Waves roll in.", 7.2));
        let generator = SceneMediaGenerator::new(chain(registry), settings(&dir));

        let media = generator
            .generate(&narrated(2, "Waves roll in."), &ChainConfig::default(), &ChainConfig::default(), None)
            .await
            .unwrap();

        assert_eq!(media.image.provider, Some(Provider::Pollinations));
        assert!(media.image.path.starts_with(dir.path().join("scene-002")));
        assert!(media.image.path.exists());
        let audio = media.audio.as_ref().unwrap();
        assert_eq!(audio.duration_seconds, Some(7.2));
        assert_eq!(audio.provider, Some(Provider::Gtts));
        assert_eq!(media.state, SceneState::AudioGenerating);
        assert!(!media.is_degraded());
        assert_eq!(media.assets().len(), 2);
    }

    #[tokio::test]
    async fn test_silent_scene_skips_voice() {
        let dir = TempDir::new().unwrap();
        let voice = FakeAdapter::ok(Provider::Gtts, Capability::Voice);
        let voice_calls = voice.calls();
        let registry = AdapterRegistry::new()
            .with(FakeAdapter::ok(Provider::Pollinations, Capability::Image))
            .with(voice);
        let generator = SceneMediaGenerator::new(chain(registry), settings(&dir));

        let media = generator
            .generate(&narrated(1, "   "), &ChainConfig::default(), &ChainConfig::default(), None)
            .await
            .unwrap();

        assert!(media.audio.is_none());
        assert!(!media.is_degraded());
        assert_eq!(media.state, SceneState::ImageReady);
        assert_eq!(voice_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_voice_exhaustion_degrades_scene() {
        let dir = TempDir::new().unwrap();
        let registry = AdapterRegistry::new()
            .with(FakeAdapter::ok(Provider::Pollinations, Capability::Image))
            .with(FakeAdapter::failing(
                Provider::Gtts,
                Capability::Voice,
                ProviderFailure::server_error("HTTP 503"),
            ));
        let generator = SceneMediaGenerator::new(chain(registry), settings(&dir));

        let media = generator
            .generate(&narrated(3, "Hello there."), &ChainConfig::default(), &ChainConfig::default(), None)
            .await
            .unwrap();

        assert!(media.audio.is_none());
        assert!(media.is_degraded());
        let failure = media.audio_failure.as_ref().unwrap();
        assert!(failure.reason.contains("voice providers exhausted"));
        assert_eq!(failure.ledger.len(), 1);
        assert_eq!(failure.ledger[0].provider, Provider::Gtts);
        assert_eq!(failure.ledger[0].failures.len(), 3);
    }

    #[tokio::test]
    async fn test_image_exhaustion_is_fatal() {
        let dir = TempDir::new().unwrap();
        let registry = AdapterRegistry::new()
            .with(FakeAdapter::failing(
                Provider::Pollinations,
                Capability::Image,
                ProviderFailure::transient("image is 12 bytes, below the 1000 byte minimum"),
            ))
            .with(FakeAdapter::ok(Provider::Gtts, Capability::Voice));
        let generator = SceneMediaGenerator::new(chain(registry), settings(&dir));

        let err = generator
            .generate(&narrated(4, "Hello."), &ChainConfig::default(), &ChainConfig::default(), None)
            .await
            .unwrap_err();

        match err {
            WorkerError::ImageExhausted { scene, source } => {
                assert_eq!(scene, 4);
                assert_eq!(source.attempts().len(), 1);
                assert_eq!(source.attempts()[0].failures.len(), 3);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_motion_failure_keeps_still_image() {
        let dir = TempDir::new().unwrap();
        let registry = AdapterRegistry::new()
            .with(FakeAdapter::ok(Provider::Pollinations, Capability::Image))
            .with(FakeAdapter::failing(
                Provider::Runway,
                Capability::Motion,
                ProviderFailure::permanent("task FAILED"),
            ));
        // Runway needs a key to be a candidate
        let chain = reel_providers::ProviderChain::new(
            registry,
            std::sync::Arc::new(reel_providers::CredentialStore::new().with_key(Provider::Runway, "rw-key")),
        )
        .with_validator(std::sync::Arc::new(crate::testing::AcceptAll))
        .with_policy(reel_providers::ChainPolicy::immediate());
        let generator = SceneMediaGenerator::new(chain, settings(&dir));

        let media = generator
            .generate(
                &narrated(1, ""),
                &ChainConfig::default(),
                &ChainConfig::default(),
                Some(&ChainConfig::default()),
            )
            .await
            .unwrap();

        assert!(media.motion.is_none());
        assert!(media.image.path.exists());
    }

    #[tokio::test]
    async fn test_requested_provider_tried_alone() {
        let dir = TempDir::new().unwrap();
        let registry = AdapterRegistry::new()
            .with(FakeAdapter::failing(
                Provider::Pollinations,
                Capability::Image,
                ProviderFailure::transient("HTTP 429"),
            ))
            .with(FakeAdapter::ok(Provider::HuggingFace, Capability::Image));
        let chain = reel_providers::ProviderChain::new(
            registry,
            std::sync::Arc::new(reel_providers::CredentialStore::new().with_key(Provider::HuggingFace, "hf")),
        )
        .with_validator(std::sync::Arc::new(crate::testing::AcceptAll))
        .with_policy(reel_providers::ChainPolicy::immediate());
        let generator = SceneMediaGenerator::new(chain, settings(&dir));

        let only_pollinations = ChainConfig {
            providers: vec![Provider::Pollinations],
            ..Default::default()
        };
        let scene = narrated(1, "");
        assert!(generator
            .generate(&scene, &only_pollinations, &ChainConfig::default(), None)
            .await
            .is_err());

        let with_ranking = ChainConfig {
            use_full_ranking: true,
            ..only_pollinations
        };
        let media = generator
            .generate(&scene, &with_ranking, &ChainConfig::default(), None)
            .await
            .unwrap();
        assert_eq!(media.image.provider, Some(Provider::HuggingFace));
    }
}
