//! In-process fakes for pipeline tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reel_media::{Compositor, FadePlan, MediaResult, RenderOutput};
use reel_models::{Capability, Provider, TimelineSegment};
use reel_providers::{
    AdapterRegistry, Artifact, ArtifactValidator, ChainPolicy, CredentialStore, GenerationParams, ProviderAdapter,
    ProviderChain, ProviderFailure,
};

/// Adapter that writes a small file, or always fails.
pub struct FakeAdapter {
    provider: Provider,
    capability: Capability,
    failure: Option<ProviderFailure>,
    /// Narration text to measured audio duration
    durations: HashMap<String, f64>,
    calls: Arc<AtomicU32>,
}

impl FakeAdapter {
    pub fn ok(provider: Provider, capability: Capability) -> Self {
        Self {
            provider,
            capability,
            failure: None,
            durations: HashMap::new(),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn failing(provider: Provider, capability: Capability, failure: ProviderFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::ok(provider, capability)
        }
    }

    pub fn with_duration(mut self, text: &str, seconds: f64) -> Self {
        self.durations.insert(text.to_string(), seconds);
        self
    }

    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    async fn invoke(
        &self,
        params: &GenerationParams,
        _credential: Option<String>,
        output: &Path,
    ) -> Result<Artifact, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        tokio::fs::write(output, self.provider.as_str()).await.unwrap();
        let artifact = Artifact::new(output, self.provider.as_str().len() as u64);
        match params {
            GenerationParams::Voice { text, .. } => {
                let seconds = self.durations.get(text).copied().unwrap_or(1.0);
                Ok(artifact.with_duration(seconds))
            }
            _ => Ok(artifact),
        }
    }
}

/// Accepts every artifact.
pub struct AcceptAll;

#[async_trait]
impl ArtifactValidator for AcceptAll {
    async fn validate(&self, _capability: Capability, artifact: Artifact) -> Result<Artifact, ProviderFailure> {
        Ok(artifact)
    }
}

/// Chain over `registry` with free providers only and no retry delays.
pub fn chain(registry: AdapterRegistry) -> ProviderChain {
    ProviderChain::new(registry, Arc::new(CredentialStore::new()))
        .with_validator(Arc::new(AcceptAll))
        .with_policy(ChainPolicy::immediate())
}

/// One recorded clip build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltClip {
    pub index: u32,
    pub duration: f64,
    pub fades: FadePlan,
    pub has_audio: bool,
}

/// Compositor that records calls and writes placeholder files.
#[derive(Default)]
pub struct RecordingCompositor {
    pub clips: Mutex<Vec<BuiltClip>>,
    pub concat_order: Mutex<Vec<PathBuf>>,
    pub music_volume: Mutex<Option<f64>>,
    pub fail_render: bool,
}

impl RecordingCompositor {
    pub fn failing_render() -> Self {
        Self {
            fail_render: true,
            ..Default::default()
        }
    }

    fn total(&self) -> f64 {
        self.clips.lock().unwrap().iter().map(|c| c.duration).sum()
    }
}

#[async_trait]
impl Compositor for RecordingCompositor {
    async fn build_clip(&self, segment: &TimelineSegment, fades: FadePlan, output: &Path) -> MediaResult<()> {
        tokio::fs::write(output, format!("clip {}", segment.index())).await?;
        self.clips.lock().unwrap().push(BuiltClip {
            index: segment.index(),
            duration: segment.effective_duration,
            fades,
            has_audio: segment.audio.is_some(),
        });
        Ok(())
    }

    async fn concat(&self, clips: &[PathBuf], _work_dir: &Path, output: &Path) -> MediaResult<()> {
        *self.concat_order.lock().unwrap() = clips.to_vec();
        tokio::fs::write(output, "joined").await?;
        Ok(())
    }

    async fn mix_music(
        &self,
        _video: &Path,
        _music: &Path,
        _total_duration: f64,
        volume: f64,
        output: &Path,
    ) -> MediaResult<()> {
        *self.music_volume.lock().unwrap() = Some(volume);
        tokio::fs::write(output, "mixed").await?;
        Ok(())
    }

    async fn finalize(&self, input: &Path, output: &Path) -> MediaResult<RenderOutput> {
        if self.fail_render {
            return Err(reel_media::MediaError::ffmpeg_failed("encoder crashed", None, Some(1)));
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(input, output).await?;
        Ok(RenderOutput {
            path: output.to_path_buf(),
            duration_seconds: self.total(),
            size_bytes: 6,
        })
    }
}
