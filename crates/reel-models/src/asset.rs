//! Generated media assets.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::capability::Provider;

/// Kind of generated media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    /// Whether assets of this kind carry a duration.
    pub fn is_timed(&self) -> bool {
        !matches!(self, MediaKind::Image)
    }
}

/// A media file owned by one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaAsset {
    pub scene_index: u32,
    pub kind: MediaKind,
    pub path: PathBuf,
    /// Duration in seconds (audio/video only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub size_bytes: u64,
    /// Provider that produced the asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
}

impl MediaAsset {
    pub fn new(scene_index: u32, kind: MediaKind, path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            scene_index,
            kind,
            path: path.into(),
            duration_seconds: None,
            size_bytes,
            provider: None,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }
}
