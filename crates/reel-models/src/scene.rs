//! Scene definitions.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Default requested scene duration in seconds.
pub const DEFAULT_SCENE_DURATION: f64 = 3.0;

/// One narrative unit of the output video.
///
/// `index` is 1-based and defines render order. The requested duration is a
/// lower bound/default only; the on-screen duration is decided once narration
/// audio is known and lives on the timeline segment, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    pub index: u32,
    pub title: String,
    pub description: String,
    pub image_prompt: String,
    /// Dialogue or narrator text, may be empty
    #[serde(default)]
    pub narration_text: String,
    #[serde(default = "default_duration")]
    pub requested_duration: f64,
    #[serde(default)]
    pub transition: Transition,
    #[serde(default)]
    pub effect: Effect,
}

fn default_duration() -> f64 {
    DEFAULT_SCENE_DURATION
}

impl Scene {
    /// Create a scene with default timing, transition and effect.
    pub fn new(index: u32, title: impl Into<String>, image_prompt: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            description: String::new(),
            image_prompt: image_prompt.into(),
            narration_text: String::new(),
            requested_duration: DEFAULT_SCENE_DURATION,
            transition: Transition::default(),
            effect: Effect::default(),
        }
    }

    pub fn with_narration(mut self, text: impl Into<String>) -> Self {
        self.narration_text = text.into();
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.requested_duration = seconds;
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    /// Whether the scene needs a narration audio artifact.
    pub fn has_narration(&self) -> bool {
        !self.narration_text.trim().is_empty()
    }

    /// Effect to render, refined by motion hints in the narration.
    pub fn resolved_effect(&self) -> Effect {
        self.effect.refine_from_narration(&self.narration_text)
    }

    /// Check that the requested duration is usable.
    pub fn validate_duration(&self) -> ModelResult<()> {
        if self.requested_duration.is_finite() && self.requested_duration > 0.0 {
            Ok(())
        } else {
            Err(ModelError::InvalidDuration {
                index: self.index,
                duration: self.requested_duration,
            })
        }
    }
}

/// Check a scene list before any media is generated for it.
///
/// Indices must be 1-based and unique, and every requested duration usable.
pub fn validate_scenes(scenes: &[Scene]) -> ModelResult<()> {
    let mut seen = HashSet::with_capacity(scenes.len());
    for scene in scenes {
        if scene.index == 0 {
            return Err(ModelError::InvalidSceneIndex(scene.index));
        }
        if !seen.insert(scene.index) {
            return Err(ModelError::DuplicateSceneIndex(scene.index));
        }
        scene.validate_duration()?;
    }
    Ok(())
}

/// Transition into the next scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    #[default]
    Fade,
    Cut,
    Zoom,
    Pan,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Fade => "fade",
            Transition::Cut => "cut",
            Transition::Zoom => "zoom",
            Transition::Pan => "pan",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transition {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "fade" | "crossfade" | "dissolve" => Ok(Transition::Fade),
            "cut" | "none" => Ok(Transition::Cut),
            "zoom" => Ok(Transition::Zoom),
            "pan" | "slide" => Ok(Transition::Pan),
            other => Err(ModelError::unknown("transition", other)),
        }
    }
}

/// Camera motion applied to a scene's still image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Simultaneous zoom ramp and diagonal pan
    #[default]
    #[serde(alias = "kenBurns")]
    KenBurns,
    #[serde(alias = "zoomIn")]
    ZoomIn,
    #[serde(alias = "zoomOut")]
    ZoomOut,
    #[serde(alias = "panLeft")]
    PanLeft,
    #[serde(alias = "panRight")]
    PanRight,
    Static,
}

const ZOOM_IN_HINTS: &[&str] = &["zoom", "grow", "expand", "enlarge", "closer"];
const ZOOM_OUT_HINTS: &[&str] = &["shrink", "smaller", "pull back", "zoom out", "farther"];
const PAN_LEFT_HINTS: &[&str] = &["left"];
const PAN_RIGHT_HINTS: &[&str] = &["right"];
const STATIC_HINTS: &[&str] = &["still", "static", "motionless", "frozen"];

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::KenBurns => "ken_burns",
            Effect::ZoomIn => "zoom_in",
            Effect::ZoomOut => "zoom_out",
            Effect::PanLeft => "pan_left",
            Effect::PanRight => "pan_right",
            Effect::Static => "static",
        }
    }

    /// Refine the default effect from motion words in the narration.
    ///
    /// Only the default Ken Burns effect is refined; an explicitly chosen
    /// effect always wins.
    pub fn refine_from_narration(self, narration: &str) -> Effect {
        if self != Effect::KenBurns || narration.trim().is_empty() {
            return self;
        }

        // Whole-word matching so "bright" does not read as "right"
        let words: String = narration
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let text = format!(" {} ", words.split_whitespace().collect::<Vec<_>>().join(" "));
        let mentions = |hints: &[&str]| {
            hints
                .iter()
                .any(|hint| text.contains(&format!(" {} ", hint)))
        };

        // "zoom out" must be checked before the generic "zoom"
        if mentions(ZOOM_OUT_HINTS) {
            Effect::ZoomOut
        } else if mentions(ZOOM_IN_HINTS) {
            Effect::ZoomIn
        } else if mentions(PAN_LEFT_HINTS) {
            Effect::PanLeft
        } else if mentions(PAN_RIGHT_HINTS) {
            Effect::PanRight
        } else if mentions(STATIC_HINTS) {
            Effect::Static
        } else {
            Effect::KenBurns
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "kenburns" => Ok(Effect::KenBurns),
            "zoomin" => Ok(Effect::ZoomIn),
            "zoomout" => Ok(Effect::ZoomOut),
            "panleft" => Ok(Effect::PanLeft),
            "panright" => Ok(Effect::PanRight),
            "static" | "none" => Ok(Effect::Static),
            _ => Err(ModelError::unknown("effect", s)),
        }
    }
}
