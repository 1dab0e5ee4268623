//! Scene clip composition and timeline rendering.
//!
//! Every scene becomes one self-contained clip with identical stream layout
//! (H.264 video at the target size/fps plus a stereo AAC track, silent when
//! the scene has no narration). Clips are then joined in scene order with the
//! concat demuxer, optionally mixed with background music, and published to
//! the output path.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use reel_models::{RenderConfig, Scene, TimelineSegment, Transition};
use tokio::fs;
use tracing::{debug, info, trace};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{self, FadePlan};
use crate::fs_utils::{file_size, move_file, unique_work_path};
use crate::media_info::read_media_info;
use crate::progress::FfmpegProgress;

/// Default fade length at scene boundaries.
pub const DEFAULT_FADE_SECONDS: f64 = 0.5;

/// Default FFmpeg timeout per operation.
pub const DEFAULT_FFMPEG_TIMEOUT_SECS: u64 = 1800;

/// Metric name for FFmpeg wall time per operation.
const FFMPEG_DURATION_SECONDS: &str = "reel_ffmpeg_duration_seconds";

/// Final rendered artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub size_bytes: u64,
}

/// Composition steps used by the pipeline.
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Build one scene clip of exactly `segment.effective_duration` seconds.
    async fn build_clip(&self, segment: &TimelineSegment, fades: FadePlan, output: &Path) -> MediaResult<()>;

    /// Join clips in the given order.
    async fn concat(&self, clips: &[PathBuf], work_dir: &Path, output: &Path) -> MediaResult<()>;

    /// Add looped, attenuated music under the existing audio track.
    async fn mix_music(
        &self,
        video: &Path,
        music: &Path,
        total_duration: f64,
        volume: f64,
        output: &Path,
    ) -> MediaResult<()>;

    /// Publish the final file and verify it.
    async fn finalize(&self, input: &Path, output: &Path) -> MediaResult<RenderOutput>;
}

/// Fade plan for the scene at `position` in index-ordered `scenes`.
///
/// The first scene always fades in from black and the last always fades out.
/// Inner boundaries dip through black unless the outgoing scene asks for a
/// hard cut.
pub fn plan_fades(scenes: &[Scene], position: usize) -> FadePlan {
    let is_first = position == 0;
    let is_last = position + 1 >= scenes.len();
    let cut_after = |i: usize| scenes.get(i).is_some_and(|s| s.transition == Transition::Cut);

    FadePlan {
        fade_in: is_first || !cut_after(position - 1),
        fade_out: is_last || !cut_after(position),
    }
}

/// FFmpeg-backed compositor.
#[derive(Debug, Clone)]
pub struct ClipComposer {
    render: RenderConfig,
    fade_seconds: f64,
    runner: FfmpegRunner,
}

impl ClipComposer {
    pub fn new(render: RenderConfig) -> Self {
        Self {
            render,
            fade_seconds: DEFAULT_FADE_SECONDS,
            runner: FfmpegRunner::new().with_timeout(DEFAULT_FFMPEG_TIMEOUT_SECS),
        }
    }

    pub fn with_fade_seconds(mut self, seconds: f64) -> Self {
        self.fade_seconds = seconds.max(0.0);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.runner = FfmpegRunner::new().with_timeout(secs);
        self
    }

    /// Command that renders one scene clip.
    pub fn scene_clip_command(&self, segment: &TimelineSegment, fades: FadePlan, output: &Path) -> FfmpegCommand {
        let duration = segment.effective_duration;

        let (cmd, video_chain) = match &segment.motion {
            Some(motion) => (
                FfmpegCommand::to_output(output)
                    .input(&motion.path)
                    .stream_loop()
                    .duration(duration),
                filters::filter_motion_clip(duration, &self.render, fades, self.fade_seconds),
            ),
            None => (
                FfmpegCommand::to_output(output)
                    .input(&segment.image.path)
                    .loop_image()
                    .input_args(["-framerate".to_string(), self.render.fps.to_string()])
                    .duration(duration),
                filters::filter_still_scene(
                    segment.scene.resolved_effect(),
                    &segment.speed_tier.profile(),
                    duration,
                    &self.render,
                    fades,
                    self.fade_seconds,
                ),
            ),
        };

        let cmd = match &segment.audio {
            Some(audio) => cmd.input(&audio.path),
            None => cmd
                .lavfi_input(filters::source_silence(self.render.sample_rate))
                .duration(duration),
        };

        let graph = format!(
            "[0:v]{}[v];[1:a]{}[a]",
            video_chain,
            filters::filter_narration(duration, self.render.sample_rate)
        );

        cmd.filter_complex(graph)
            .map("[v]")
            .map("[a]")
            .output_args(self.render.to_ffmpeg_args())
            .output_duration(duration)
    }

    /// Command that joins clips listed in a concat file.
    pub fn concat_command(&self, list_file: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::to_output(output)
            .input(list_file)
            .input_args(["-f", "concat", "-safe", "0"])
            .stream_copy()
    }

    /// Command that mixes music under the timeline audio.
    pub fn music_command(
        &self,
        video: &Path,
        music: &Path,
        total_duration: f64,
        volume: f64,
        output: &Path,
    ) -> FfmpegCommand {
        FfmpegCommand::to_output(output)
            .input(video)
            .input(music)
            .stream_loop()
            .filter_complex(filters::filter_music_mix(
                total_duration,
                volume,
                self.render.sample_rate,
            ))
            .map("0:v")
            .map("[mixed]")
            .video_codec("copy")
            .audio_codec(self.render.audio_codec.clone())
            .output_arg("-b:a")
            .output_arg(self.render.audio_bitrate.clone())
            .output_duration(total_duration)
    }

    async fn run_timed(&self, operation: &'static str, cmd: &FfmpegCommand, expected_seconds: f64) -> MediaResult<()> {
        let started = Instant::now();
        let result = self
            .runner
            .run_with_progress(cmd, move |progress: FfmpegProgress| {
                trace!(
                    operation,
                    percent = progress.percentage(expected_seconds),
                    speed = progress.speed,
                    "FFmpeg progress"
                );
            })
            .await;
        histogram!(FFMPEG_DURATION_SECONDS, "operation" => operation)
            .record(started.elapsed().as_secs_f64());
        result?;

        match file_size(cmd.output_path()).await {
            Some(size) if size > 0 => Ok(()),
            _ => Err(MediaError::invalid_media(format!(
                "{} produced no output at {}",
                operation,
                cmd.output_path().display()
            ))),
        }
    }
}

/// Render the concat demuxer list for `clips`.
pub fn concat_list(clips: &[PathBuf]) -> String {
    clips
        .iter()
        .map(|clip| format!("file '{}'\n", clip.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

#[async_trait]
impl Compositor for ClipComposer {
    async fn build_clip(&self, segment: &TimelineSegment, fades: FadePlan, output: &Path) -> MediaResult<()> {
        if !segment.image.path.exists() && segment.motion.is_none() {
            return Err(MediaError::FileNotFound(segment.image.path.clone()));
        }
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }

        let cmd = self.scene_clip_command(segment, fades, output);
        debug!(
            scene_index = segment.index(),
            duration = segment.effective_duration,
            tier = segment.speed_tier.as_str(),
            "Building scene clip"
        );
        self.run_timed("scene_clip", &cmd, segment.effective_duration).await
    }

    async fn concat(&self, clips: &[PathBuf], work_dir: &Path, output: &Path) -> MediaResult<()> {
        if clips.is_empty() {
            return Err(MediaError::TimelineNotReady("no clips to concatenate".to_string()));
        }

        fs::create_dir_all(work_dir).await?;
        let list_file = unique_work_path(work_dir, "concat", "txt");

        // Absolute paths so the list resolves regardless of its own location
        let mut absolute = Vec::with_capacity(clips.len());
        for clip in clips {
            absolute.push(fs::canonicalize(clip).await.map_err(|_| MediaError::FileNotFound(clip.clone()))?);
        }
        fs::write(&list_file, concat_list(&absolute)).await?;

        info!("Concatenating {} scene clips", clips.len());
        let result = self
            .run_timed("concat", &self.concat_command(&list_file, output), 0.0)
            .await;
        let _ = fs::remove_file(&list_file).await;
        result
    }

    async fn mix_music(
        &self,
        video: &Path,
        music: &Path,
        total_duration: f64,
        volume: f64,
        output: &Path,
    ) -> MediaResult<()> {
        if !music.exists() {
            return Err(MediaError::FileNotFound(music.to_path_buf()));
        }

        info!(volume, total_duration, "Mixing background music");
        let cmd = self.music_command(video, music, total_duration, volume, output);
        self.run_timed("music_mix", &cmd, total_duration).await
    }

    async fn finalize(&self, input: &Path, output: &Path) -> MediaResult<RenderOutput> {
        let staged = input.with_extension("final.mp4");
        let cmd = FfmpegCommand::new(input, &staged)
            .map("0")
            .stream_copy()
            .faststart();
        self.run_timed("finalize", &cmd, 0.0).await?;

        move_file(&staged, output).await?;

        let info = read_media_info(output).await?;
        if !info.has_video || info.size == 0 {
            return Err(MediaError::invalid_media(format!(
                "rendered file {} has no video",
                output.display()
            )));
        }

        info!(
            path = %output.display(),
            duration = info.duration,
            size_bytes = info.size,
            "Render complete"
        );

        Ok(RenderOutput {
            path: output.to_path_buf(),
            duration_seconds: info.duration,
            size_bytes: info.size,
        })
    }
}
