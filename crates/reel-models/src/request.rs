//! Video generation requests.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::capability::{Capability, Provider};
use crate::scene::{validate_scenes, Scene};

/// Caller provider preferences per capability.
///
/// An empty list means "use the capability ranking". A non-empty list is
/// tried alone unless `use_full_ranking` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderPreferences {
    #[serde(default)]
    pub script: Vec<Provider>,
    #[serde(default)]
    pub image: Vec<Provider>,
    #[serde(default)]
    pub voice: Vec<Provider>,
    #[serde(default)]
    pub motion: Vec<Provider>,
    #[serde(default)]
    pub use_full_ranking: bool,
}

impl ProviderPreferences {
    pub fn for_capability(&self, capability: Capability) -> &[Provider] {
        match capability {
            Capability::Script => &self.script,
            Capability::Image => &self.image,
            Capability::Voice => &self.voice,
            Capability::Motion => &self.motion,
        }
    }
}

/// A request to produce one narrated video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[validate(schema(function = "validate_source"))]
pub struct VideoRequest {
    /// Idea to script; ignored when `scenes` is given
    #[serde(default)]
    #[validate(length(min = 1, max = 2000))]
    pub prompt: Option<String>,

    /// Ready-made scenes, bypassing script generation
    #[serde(default)]
    pub scenes: Option<Vec<Scene>>,

    #[serde(default = "default_scene_count")]
    #[validate(range(min = 1, max = 50))]
    pub scene_count: u32,

    pub output_path: PathBuf,

    #[serde(default)]
    pub background_music: Option<PathBuf>,

    /// Overrides the configured provider preferences
    #[serde(default)]
    pub preferences: Option<ProviderPreferences>,
}

fn default_scene_count() -> u32 {
    5
}

fn validate_source(request: &VideoRequest) -> Result<(), ValidationError> {
    let has_scenes = request.scenes.as_ref().is_some_and(|s| !s.is_empty());
    let has_prompt = request
        .prompt
        .as_ref()
        .is_some_and(|p| !p.trim().is_empty());

    if !has_scenes && !has_prompt {
        return Err(ValidationError::new("prompt_or_scenes_required"));
    }
    if let Some(scenes) = &request.scenes {
        validate_scenes(scenes).map_err(|e| {
            let mut err = ValidationError::new("invalid_scenes");
            err.message = Some(e.to_string().into());
            err
        })?;
    }
    Ok(())
}

impl VideoRequest {
    pub fn from_prompt(prompt: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            scenes: None,
            scene_count: default_scene_count(),
            output_path: output_path.into(),
            background_music: None,
            preferences: None,
        }
    }

    pub fn from_scenes(scenes: Vec<Scene>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            prompt: None,
            scene_count: scenes.len() as u32,
            scenes: Some(scenes),
            output_path: output_path.into(),
            background_music: None,
            preferences: None,
        }
    }

    pub fn with_scene_count(mut self, count: u32) -> Self {
        self.scene_count = count;
        self
    }

    pub fn with_music(mut self, path: impl Into<PathBuf>) -> Self {
        self.background_music = Some(path.into());
        self
    }

    pub fn with_preferences(mut self, preferences: ProviderPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_or_scenes_required() {
        let mut request = VideoRequest::from_prompt("a day at sea", "out.mp4");
        assert!(request.validate().is_ok());

        request.prompt = None;
        assert!(request.validate().is_err());

        let request = VideoRequest::from_scenes(vec![Scene::new(1, "a", "b")], "out.mp4");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_scene_indices_checked() {
        let request = VideoRequest::from_scenes(
            vec![Scene::new(1, "a", "b"), Scene::new(1, "c", "d"), Scene::new(0, "e", "f")],
            "out.mp4",
        );
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_scene_count_range() {
        let request = VideoRequest::from_prompt("x", "out.mp4").with_scene_count(0);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_preferences_lookup() {
        let prefs = ProviderPreferences {
            image: vec![Provider::Stability, Provider::Pollinations],
            ..Default::default()
        };
        assert_eq!(prefs.for_capability(Capability::Image).len(), 2);
        assert!(prefs.for_capability(Capability::Voice).is_empty());
    }
}
