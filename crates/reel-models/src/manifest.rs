//! Machine-readable scene manifest written next to the rendered video.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::capability::Provider;
use crate::scene::{Effect, Transition};
use crate::timeline::Timeline;

/// Per-scene manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestScene {
    pub index: u32,
    pub title: String,
    pub description: String,
    pub image_prompt: String,
    pub narration: String,
    pub requested_duration: f64,
    pub effective_duration: f64,
    pub start_offset: f64,
    pub transition: Transition,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_provider: Option<Provider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_provider: Option<Provider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_provider: Option<Provider>,
}

/// Manifest describing how a video was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScriptManifest {
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub total_scenes: usize,
    pub total_duration: f64,
    pub scenes: Vec<ManifestScene>,
}

impl ScriptManifest {
    /// Build a manifest from an assembled timeline.
    pub fn from_timeline(prompt: Option<&str>, timeline: &Timeline) -> Self {
        let scenes: Vec<ManifestScene> = timeline
            .segments()
            .iter()
            .map(|segment| ManifestScene {
                index: segment.scene.index,
                title: segment.scene.title.clone(),
                description: segment.scene.description.clone(),
                image_prompt: segment.scene.image_prompt.clone(),
                narration: segment.scene.narration_text.clone(),
                requested_duration: segment.scene.requested_duration,
                effective_duration: segment.effective_duration,
                start_offset: segment.start_offset,
                transition: segment.scene.transition,
                effect: segment.scene.resolved_effect(),
                image_provider: segment.image.provider,
                voice_provider: segment.audio.as_ref().and_then(|a| a.provider),
                motion_provider: segment.motion.as_ref().and_then(|m| m.provider),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            prompt: prompt.map(str::to_string),
            total_scenes: scenes.len(),
            total_duration: timeline.total_duration(),
            scenes,
        }
    }
}
