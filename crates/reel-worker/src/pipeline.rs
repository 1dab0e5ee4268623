//! End-to-end narrated video pipeline.
//!
//! A run moves through two stages. Media acquisition generates every scene's
//! image and narration (bounded across scenes, concurrent within a scene) and
//! reconciles its duration. Clip construction then builds each scene clip
//! once, from final values. Only when every scene is built is the timeline
//! assembled, concatenated in index order, mixed with music and rendered.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use reel_media::{file_size, plan_fades, unique_scene_path, unique_work_path, ClipComposer, Compositor, RenderOutput};
use reel_models::{
    validate_scenes, Capability, MediaAsset, MediaKind, ProviderPreferences, Scene, ScriptManifest, Timeline,
    TimelineSegment, VideoRequest,
};
use reel_providers::{
    build_client, read_script, AdapterRegistry, CredentialProvider, GenerationParams, ProviderChain,
};
use tokio::fs;
use tracing::{debug, info, Instrument};
use validator::Validate;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::generator::{ChainConfig, GeneratorSettings, SceneMediaGenerator};
use crate::logging::RunLogger;
use crate::metrics;
use crate::reconcile::DurationReconciler;
use crate::state::{PipelineState, RunStatus, SceneState};

/// File name of the scene manifest written next to the video.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub output: RenderOutput,
    pub manifest_path: PathBuf,
    pub timeline: Timeline,
    pub status: RunStatus,
}

/// Chain settings per capability for one run.
#[derive(Debug, Clone)]
struct RunChains {
    script: ChainConfig,
    image: ChainConfig,
    voice: ChainConfig,
    motion: Option<ChainConfig>,
}

/// One scene after clip construction.
struct BuiltScene {
    segment: TimelineSegment,
    degraded: bool,
}

pub struct Pipeline {
    config: WorkerConfig,
    chain: ProviderChain,
    compositor: Arc<dyn Compositor>,
    reconciler: DurationReconciler,
}

impl Pipeline {
    pub fn new(config: WorkerConfig, chain: ProviderChain, compositor: Arc<dyn Compositor>) -> Self {
        let reconciler = DurationReconciler::new(config.buffer_seconds);
        Self {
            config,
            chain,
            compositor,
            reconciler,
        }
    }

    /// Pipeline with the built-in adapters and the FFmpeg compositor.
    pub fn from_config(config: WorkerConfig, credentials: Arc<dyn CredentialProvider>) -> WorkerResult<Self> {
        let client = build_client(config.http_timeout()).map_err(|e| WorkerError::config_error(e.reason))?;
        let registry = AdapterRegistry::with_defaults(client, &config.adapter_settings());
        let chain = ProviderChain::new(registry, credentials)
            .with_policy(config.chain_policy())
            .with_limits(Arc::new(config.provider_limits()));
        let compositor = ClipComposer::new(config.render.clone())
            .with_fade_seconds(config.fade_seconds)
            .with_timeout(config.render_timeout_secs);

        Ok(Self::new(config, chain, Arc::new(compositor)))
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Scratch directory of one run.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.config.work_dir.join(run_id)
    }

    /// Produce the video described by `request`.
    ///
    /// The run's scratch directory is removed whether or not it succeeds.
    pub async fn run(&self, request: &VideoRequest, logger: &RunLogger) -> WorkerResult<RunReport> {
        let run_dir = self.run_dir(logger.run_id());
        let started = Instant::now();

        let result = self
            .run_in(request, logger, &run_dir)
            .instrument(logger.run_span())
            .await;

        if let Err(e) = fs::remove_dir_all(&run_dir).await {
            debug!("Failed to remove {}: {}", run_dir.display(), e);
        }

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(report) => {
                metrics::record_run("success", elapsed);
                logger.run_completed(report, elapsed);
            }
            Err(e) => {
                metrics::record_run("failure", elapsed);
                logger.run_failed(e, elapsed);
            }
        }
        result
    }

    async fn run_in(&self, request: &VideoRequest, logger: &RunLogger, run_dir: &Path) -> WorkerResult<RunReport> {
        request
            .validate()
            .map_err(|e| WorkerError::invalid_request(e.to_string()))?;
        let music = self.background_music(request).await?;
        fs::create_dir_all(run_dir).await?;

        let chains = self.chains(request.preferences.as_ref());
        logger.run_started(request);

        let mut scenes = self.resolve_scenes(request, &chains.script, run_dir).await?;
        validate_scenes(&scenes).map_err(|e| WorkerError::invalid_request(e.to_string()))?;
        scenes.sort_by_key(|s| s.index);
        logger.scenes_resolved(&scenes);

        let mut status = RunStatus::new(logger.run_id(), scenes.len() as u32);

        let generator = SceneMediaGenerator::new(
            self.chain.clone(),
            GeneratorSettings {
                work_dir: run_dir.to_path_buf(),
                width: self.config.render.width,
                height: self.config.render.height,
                voices: self.config.voices.clone(),
                language: self.config.language.clone(),
            },
        );

        let built: Vec<BuiltScene> = stream::iter(0..scenes.len())
            .map(|position| {
                self.build_scene(&generator, &scenes, position, &chains, logger)
                    .instrument(logger.scene_span(&scenes[position]))
            })
            .buffer_unordered(self.config.max_scene_parallel.max(1))
            .try_collect()
            .await?;

        let mut segments = Vec::with_capacity(built.len());
        for scene in built {
            status.scene_built(scene.degraded.then(|| scene.segment.index()));
            segments.push(scene.segment);
        }

        let timeline = Timeline::assemble(segments, music)?;
        let output = self
            .render(&timeline, &request.output_path, run_dir, &mut status, logger)
            .await?;
        let manifest_path = write_manifest(request, &timeline).await?;
        status.set_state(PipelineState::Done)?;
        logger.stage(&status);

        Ok(RunReport {
            output,
            manifest_path,
            timeline,
            status,
        })
    }

    fn chains(&self, overrides: Option<&ProviderPreferences>) -> RunChains {
        let configured = self.config.preferences();
        let preferences = overrides.unwrap_or(&configured);
        let retries = self.config.max_retries;

        RunChains {
            script: ChainConfig::from_preferences(preferences, Capability::Script, retries),
            image: ChainConfig::from_preferences(preferences, Capability::Image, retries),
            voice: ChainConfig::from_preferences(preferences, Capability::Voice, retries),
            motion: self
                .config
                .enable_motion
                .then(|| ChainConfig::from_preferences(preferences, Capability::Motion, retries)),
        }
    }

    async fn background_music(&self, request: &VideoRequest) -> WorkerResult<Option<MediaAsset>> {
        let Some(path) = &request.background_music else {
            return Ok(None);
        };
        match file_size(path).await {
            Some(size) if size > 0 => Ok(Some(MediaAsset::new(0, MediaKind::Audio, path, size))),
            _ => Err(WorkerError::invalid_request(format!(
                "background music {} is missing or empty",
                path.display()
            ))),
        }
    }

    /// Scenes from the request, or a generated script.
    async fn resolve_scenes(
        &self,
        request: &VideoRequest,
        script_chain: &ChainConfig,
        run_dir: &Path,
    ) -> WorkerResult<Vec<Scene>> {
        if let Some(scenes) = request.scenes.as_ref().filter(|s| !s.is_empty()) {
            return Ok(scenes.clone());
        }

        let prompt = request.prompt.clone().unwrap_or_default();
        let script_request = script_chain.request(
            GenerationParams::Script {
                prompt,
                scene_count: request.scene_count,
                default_duration: self.config.default_scene_duration,
            },
            unique_work_path(run_dir, "script", Capability::Script.extension()),
        );

        let success = self
            .chain
            .execute(&script_request)
            .await
            .map_err(WorkerError::ScriptFailed)?;
        let scenes = read_script(success.path())
            .await
            .map_err(|failure| WorkerError::invalid_request(failure.reason))?;
        info!(
            provider = %success.provider,
            scenes = scenes.len(),
            "Script ready"
        );
        Ok(scenes)
    }

    /// Acquire media, reconcile and build the clip for `scenes[position]`.
    async fn build_scene(
        &self,
        generator: &SceneMediaGenerator,
        scenes: &[Scene],
        position: usize,
        chains: &RunChains,
        logger: &RunLogger,
    ) -> WorkerResult<BuiltScene> {
        let scene = &scenes[position];
        let media = generator
            .generate(scene, &chains.image, &chains.voice, chains.motion.as_ref())
            .await?;
        if let Some(failure) = &media.audio_failure {
            logger.scene_degraded(scene, failure);
        }

        let timing = self.reconciler.reconcile(scene, media.audio.as_ref());
        let state = media.state.advance(SceneState::DurationReconciled)?;
        debug!(
            scene_index = scene.index,
            requested = scene.requested_duration,
            effective = timing.effective_duration,
            tier = timing.speed_tier.as_str(),
            "Duration reconciled"
        );

        let degraded = media.is_degraded();
        let segment = TimelineSegment::new(
            media.scene,
            media.image,
            media.audio,
            timing.effective_duration,
            timing.speed_tier,
        )
        .with_motion(media.motion);

        let clip_path = unique_scene_path(generator.settings().work_dir.as_path(), scene.index, "clip", "mp4");
        self.compositor
            .build_clip(&segment, plan_fades(scenes, position), &clip_path)
            .await?;
        state.advance(SceneState::ClipBuilt)?;

        metrics::record_scene_built(segment.audio.is_some());
        logger.scene_built(
            scene.index,
            segment.effective_duration,
            segment.speed_tier,
            segment.audio.is_some(),
        );

        Ok(BuiltScene {
            segment: segment.with_clip(clip_path),
            degraded,
        })
    }

    /// Join, mix and publish the timeline.
    async fn render(
        &self,
        timeline: &Timeline,
        output: &Path,
        run_dir: &Path,
        status: &mut RunStatus,
        logger: &RunLogger,
    ) -> WorkerResult<RenderOutput> {
        let clips = timeline
            .clip_paths()
            .ok_or_else(|| reel_media::MediaError::TimelineNotReady("scene clip missing".to_string()))?;
        let total = timeline.total_duration();

        status.set_state(PipelineState::Concatenating)?;
        logger.stage(status);
        let joined = unique_work_path(run_dir, "joined", "mp4");
        self.compositor.concat(&clips, run_dir, &joined).await?;

        let mut current = joined;
        if let Some(music) = timeline.background_music() {
            status.set_state(PipelineState::MusicMixing)?;
            logger.stage(status);
            let mixed = unique_work_path(run_dir, "mixed", "mp4");
            let volume = self.config.music_volume_for(timeline.has_narration());
            self.compositor
                .mix_music(&current, &music.path, total, volume, &mixed)
                .await?;
            current = mixed;
        }

        status.set_state(PipelineState::Rendering)?;
        logger.stage(status);
        Ok(self.compositor.finalize(&current, output).await?)
    }
}

async fn write_manifest(request: &VideoRequest, timeline: &Timeline) -> WorkerResult<PathBuf> {
    let manifest = ScriptManifest::from_timeline(request.prompt.as_deref(), timeline);
    let path = match request.output_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(MANIFEST_FILE),
        _ => PathBuf::from(MANIFEST_FILE),
    };
    fs::write(&path, serde_json::to_vec_pretty(&manifest)?).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chain, FakeAdapter, RecordingCompositor};
    use reel_media::FadePlan;
    use reel_models::{Provider, Transition};
    use reel_providers::{AdapterRegistry, ProviderFailure};
    use reel_providers::adapters::TemplateScript;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> WorkerConfig {
        WorkerConfig {
            work_dir: dir.path().join("work"),
            ..Default::default()
        }
    }

    fn scenes() -> Vec<Scene> {
        vec![
            Scene::new(1, "Dawn", "sunrise over a harbor").with_duration(3.0),
            Scene::new(2, "Boats", "fishing boats leaving")
                .with_duration(3.0)
                .with_narration("The boats head out before first light."),
            Scene::new(3, "Dusk", "boats returning at dusk").with_duration(3.0),
        ]
    }

    fn registry() -> AdapterRegistry {
        AdapterRegistry::new()
            .with(FakeAdapter::ok(Provider::Pollinations, Capability::Image))
            .with(
                FakeAdapter::ok(Provider::Gtts, Capability::Voice)
                    .with_duration("The boats head out before first light.", 7.2),
            )
            .with(TemplateScript)
    }

    #[tokio::test]
    async fn test_reconciled_scenario_totals() {
        let dir = TempDir::new().unwrap();
        let compositor = Arc::new(RecordingCompositor::default());
        let pipeline = Pipeline::new(config(&dir), chain(registry()), compositor.clone());
        let request = VideoRequest::from_scenes(scenes(), dir.path().join("out/video.mp4"));

        let report = pipeline
            .run(&request, &RunLogger::with_run_id("run-1", "test"))
            .await
            .unwrap();

        let durations: Vec<f64> = report
            .timeline
            .segments()
            .iter()
            .map(|s| s.effective_duration)
            .collect();
        assert_eq!(durations.len(), 3);
        assert_eq!(durations[0], 3.0);
        assert!((durations[1] - 7.7).abs() < 1e-9);
        assert_eq!(durations[2], 3.0);
        assert!((report.timeline.total_duration() - 13.7).abs() < 1e-9);
        assert!((report.output.duration_seconds - 13.7).abs() < 1e-9);

        let starts: Vec<f64> = report.timeline.segments().iter().map(|s| s.start_offset).collect();
        assert_eq!(starts[0], 0.0);
        assert_eq!(starts[1], 3.0);
        assert!((starts[2] - 10.7).abs() < 1e-9);

        assert_eq!(report.status.state, PipelineState::Done);
        assert_eq!(report.status.scenes_built, 3);
        assert!(report.status.degraded_scenes.is_empty());
        assert!(request.output_path.exists());

        let manifest: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&report.manifest_path).unwrap()).unwrap();
        assert_eq!(manifest["total_scenes"], 3);
        assert_eq!(manifest["scenes"][1]["voice_provider"], "gtts");

        // Scratch is gone after the run
        assert!(!dir.path().join("work/run-1").exists());
    }

    #[tokio::test]
    async fn test_clips_join_in_index_order() {
        let dir = TempDir::new().unwrap();
        let compositor = Arc::new(RecordingCompositor::default());
        let pipeline = Pipeline::new(
            WorkerConfig {
                max_scene_parallel: 3,
                ..config(&dir)
            },
            chain(registry()),
            compositor.clone(),
        );
        let mut shuffled = scenes();
        shuffled.reverse();
        let request = VideoRequest::from_scenes(shuffled, dir.path().join("video.mp4"));

        pipeline
            .run(&request, &RunLogger::new("test"))
            .await
            .unwrap();

        let order: Vec<String> = compositor
            .concat_order
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.parent().unwrap().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(order, vec!["scene-001", "scene-002", "scene-003"]);
    }

    #[tokio::test]
    async fn test_fades_follow_transitions() {
        let dir = TempDir::new().unwrap();
        let compositor = Arc::new(RecordingCompositor::default());
        let pipeline = Pipeline::new(config(&dir), chain(registry()), compositor.clone());
        let mut with_cut = scenes();
        with_cut[0].transition = Transition::Cut;
        let request = VideoRequest::from_scenes(with_cut, dir.path().join("video.mp4"));

        pipeline.run(&request, &RunLogger::new("test")).await.unwrap();

        let mut clips = compositor.clips.lock().unwrap().clone();
        clips.sort_by_key(|c| c.index);
        assert_eq!(
            clips[0].fades,
            FadePlan {
                fade_in: true,
                fade_out: false
            }
        );
        assert_eq!(
            clips[1].fades,
            FadePlan {
                fade_in: false,
                fade_out: true
            }
        );
        assert_eq!(clips[2].fades, FadePlan::both());
    }

    #[tokio::test]
    async fn test_degraded_audio_still_completes() {
        let dir = TempDir::new().unwrap();
        let registry = AdapterRegistry::new()
            .with(FakeAdapter::ok(Provider::Pollinations, Capability::Image))
            .with(FakeAdapter::failing(
                Provider::Gtts,
                Capability::Voice,
                ProviderFailure::transient("HTTP 429: rate limited"),
            ));
        let compositor = Arc::new(RecordingCompositor::default());
        let pipeline = Pipeline::new(config(&dir), chain(registry), compositor.clone());
        let request = VideoRequest::from_scenes(scenes(), dir.path().join("video.mp4"));

        let report = pipeline.run(&request, &RunLogger::new("test")).await.unwrap();

        let scene_two = &report.timeline.segments()[1];
        assert!(scene_two.audio.is_none());
        assert_eq!(scene_two.effective_duration, 3.0);
        assert_eq!(report.status.degraded_scenes, vec![2]);
        assert!((report.timeline.total_duration() - 9.0).abs() < 1e-9);
        assert!(compositor.clips.lock().unwrap().iter().all(|c| !c.has_audio));
    }

    #[tokio::test]
    async fn test_image_exhaustion_aborts_run() {
        let dir = TempDir::new().unwrap();
        let registry = AdapterRegistry::new()
            .with(FakeAdapter::failing(
                Provider::Pollinations,
                Capability::Image,
                ProviderFailure::server_error("HTTP 502"),
            ))
            .with(FakeAdapter::ok(Provider::Gtts, Capability::Voice));
        let compositor = Arc::new(RecordingCompositor::default());
        let pipeline = Pipeline::new(config(&dir), chain(registry), compositor.clone());
        let request = VideoRequest::from_scenes(scenes(), dir.path().join("video.mp4"));

        let err = pipeline.run(&request, &RunLogger::new("test")).await.unwrap_err();

        assert!(matches!(err, WorkerError::ImageExhausted { .. }));
        assert_eq!(err.capability(), Some(Capability::Image));
        assert!(compositor.concat_order.lock().unwrap().is_empty());
        assert!(!request.output_path.exists());
    }

    #[tokio::test]
    async fn test_render_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            config(&dir),
            chain(registry()),
            Arc::new(RecordingCompositor::failing_render()),
        );
        let request = VideoRequest::from_scenes(scenes(), dir.path().join("video.mp4"));

        let err = pipeline.run(&request, &RunLogger::new("test")).await.unwrap_err();
        assert!(matches!(err, WorkerError::Render(_)));
        assert!(err.is_permanent_failure());
    }

    #[tokio::test]
    async fn test_music_volume_depends_on_narration() {
        let dir = TempDir::new().unwrap();
        let music = dir.path().join("music.mp3");
        std::fs::write(&music, b"ID3 music").unwrap();

        let compositor = Arc::new(RecordingCompositor::default());
        let pipeline = Pipeline::new(config(&dir), chain(registry()), compositor.clone());
        let request = VideoRequest::from_scenes(scenes(), dir.path().join("video.mp4")).with_music(&music);
        pipeline.run(&request, &RunLogger::new("test")).await.unwrap();
        assert_eq!(*compositor.music_volume.lock().unwrap(), Some(0.3));

        let silent: Vec<Scene> = scenes().into_iter().map(|s| s.with_narration("")).collect();
        let compositor = Arc::new(RecordingCompositor::default());
        let pipeline = Pipeline::new(config(&dir), chain(registry()), compositor.clone());
        let request = VideoRequest::from_scenes(silent, dir.path().join("video.mp4")).with_music(&music);
        pipeline.run(&request, &RunLogger::new("test")).await.unwrap();
        assert_eq!(*compositor.music_volume.lock().unwrap(), Some(0.5));
    }

    #[tokio::test]
    async fn test_missing_music_rejected_before_generation() {
        let dir = TempDir::new().unwrap();
        let image = FakeAdapter::ok(Provider::Pollinations, Capability::Image);
        let image_calls = image.calls();
        let pipeline = Pipeline::new(
            config(&dir),
            chain(AdapterRegistry::new().with(image)),
            Arc::new(RecordingCompositor::default()),
        );
        let request = VideoRequest::from_scenes(scenes(), dir.path().join("video.mp4"))
            .with_music(dir.path().join("nope.mp3"));

        let err = pipeline.run(&request, &RunLogger::new("test")).await.unwrap_err();
        assert!(matches!(err, WorkerError::InvalidRequest(_)));
        assert_eq!(image_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bad_scene_indices_rejected_before_generation() {
        let dir = TempDir::new().unwrap();
        let image = FakeAdapter::ok(Provider::Pollinations, Capability::Image);
        let image_calls = image.calls();
        let compositor = Arc::new(RecordingCompositor::default());
        let pipeline = Pipeline::new(config(&dir), chain(AdapterRegistry::new().with(image)), compositor.clone());

        let mut duplicated = scenes();
        duplicated[1].index = 1;
        duplicated[2].index = 0;
        let request = VideoRequest::from_scenes(duplicated, dir.path().join("video.mp4"));
        let err = pipeline.run(&request, &RunLogger::new("test")).await.unwrap_err();
        assert!(matches!(err, WorkerError::InvalidRequest(_)));

        let mut zero_based = scenes();
        for scene in zero_based.iter_mut() {
            scene.index -= 1;
        }
        let request = VideoRequest::from_scenes(zero_based, dir.path().join("video.mp4"));
        let err = pipeline.run(&request, &RunLogger::new("test")).await.unwrap_err();
        assert!(err.to_string().contains("indices start at 1"));

        assert_eq!(image_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(compositor.clips.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_uses_script_chain() {
        let dir = TempDir::new().unwrap();
        let compositor = Arc::new(RecordingCompositor::default());
        let pipeline = Pipeline::new(config(&dir), chain(registry()), compositor.clone());
        let request =
            VideoRequest::from_prompt("a day in a fishing village", dir.path().join("video.mp4")).with_scene_count(4);

        let report = pipeline.run(&request, &RunLogger::new("test")).await.unwrap();

        assert_eq!(report.timeline.len(), 4);
        let indices: Vec<u32> = report.timeline.segments().iter().map(|s| s.index()).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        // Template scenes narrate, so every scene has audio from the fake voice
        assert!(report.timeline.segments().iter().all(|s| s.audio.is_some()));
    }
}
