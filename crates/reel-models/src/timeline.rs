//! Duration-reconciled scene timeline.

use std::collections::HashSet;
use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::asset::MediaAsset;
use crate::error::{ModelError, ModelResult};
use crate::motion::SpeedTier;
use crate::scene::Scene;

/// One scene placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimelineSegment {
    pub scene: Scene,
    pub image: MediaAsset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaAsset>,
    /// Optional image-to-video clip replacing the still image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<MediaAsset>,
    /// Authoritative on-screen duration in seconds
    pub effective_duration: f64,
    pub speed_tier: SpeedTier,
    /// Start offset in seconds, assigned by [`Timeline::assemble`]
    #[serde(default)]
    pub start_offset: f64,
    /// Rendered per-scene clip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_path: Option<PathBuf>,
}

impl TimelineSegment {
    pub fn new(
        scene: Scene,
        image: MediaAsset,
        audio: Option<MediaAsset>,
        effective_duration: f64,
        speed_tier: SpeedTier,
    ) -> Self {
        Self {
            scene,
            image,
            audio,
            motion: None,
            effective_duration,
            speed_tier,
            start_offset: 0.0,
            clip_path: None,
        }
    }

    pub fn with_motion(mut self, motion: Option<MediaAsset>) -> Self {
        self.motion = motion;
        self
    }

    pub fn with_clip(mut self, clip_path: impl Into<PathBuf>) -> Self {
        self.clip_path = Some(clip_path.into());
        self
    }

    pub fn index(&self) -> u32 {
        self.scene.index
    }

    pub fn end_offset(&self) -> f64 {
        self.start_offset + self.effective_duration
    }
}

/// Ordered scene segments plus optional background music.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Timeline {
    segments: Vec<TimelineSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    background_music: Option<MediaAsset>,
}

impl Timeline {
    /// Assemble a timeline from segments in any completion order.
    ///
    /// Segments are ordered by scene index and laid end to end, so
    /// `start[i + 1] == start[i] + effective_duration[i]`.
    pub fn assemble(
        mut segments: Vec<TimelineSegment>,
        background_music: Option<MediaAsset>,
    ) -> ModelResult<Self> {
        if segments.is_empty() {
            return Err(ModelError::EmptyTimeline);
        }

        segments.sort_by_key(|s| s.scene.index);

        let mut seen = HashSet::with_capacity(segments.len());
        let mut offset = 0.0;
        for segment in &mut segments {
            if !seen.insert(segment.scene.index) {
                return Err(ModelError::DuplicateSceneIndex(segment.scene.index));
            }
            if !(segment.effective_duration.is_finite() && segment.effective_duration > 0.0) {
                return Err(ModelError::InvalidDuration {
                    index: segment.scene.index,
                    duration: segment.effective_duration,
                });
            }
            segment.start_offset = offset;
            offset = segment.end_offset();
        }

        Ok(Self {
            segments,
            background_music,
        })
    }

    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    pub fn background_music(&self) -> Option<&MediaAsset> {
        self.background_music.as_ref()
    }

    /// Total length in seconds.
    pub fn total_duration(&self) -> f64 {
        self.segments.last().map(|s| s.end_offset()).unwrap_or(0.0)
    }

    /// Whether any scene carries narration audio.
    pub fn has_narration(&self) -> bool {
        self.segments.iter().any(|s| s.audio.is_some())
    }

    /// Per-scene clips in render order, `None` if any scene is not built.
    pub fn clip_paths(&self) -> Option<Vec<PathBuf>> {
        self.segments.iter().map(|s| s.clip_path.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
