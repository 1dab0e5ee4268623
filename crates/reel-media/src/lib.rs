#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for narrated video composition.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with any number of inputs
//! - Progress parsing from `-progress pipe:2`
//! - FFprobe-based media inspection
//! - Pan/zoom, fade and music-mix filter expressions
//! - The scene clip compositor and timeline render steps

pub mod command;
pub mod compose;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod media_info;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{plan_fades, ClipComposer, Compositor, RenderOutput, DEFAULT_FADE_SECONDS};
pub use error::{MediaError, MediaResult};
pub use filters::FadePlan;
pub use fs_utils::{file_size, move_file, unique_scene_path, unique_work_path};
pub use media_info::{audio_duration, read_media_info, MediaInfo};
pub use progress::FfmpegProgress;
