//! Scene script parsing, normalization and the offline template.

use std::path::Path;

use reel_models::{Effect, Scene, Transition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::adapters::http::{io_failure, write_bytes};
use crate::error::ProviderFailure;
use crate::outcome::Artifact;

/// Script JSON as returned by language models.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScript {
    Document {
        #[serde(default)]
        scenes: Vec<RawScene>,
    },
    Scenes(Vec<RawScene>),
}

#[derive(Debug, Default, Deserialize)]
struct RawScene {
    title: Option<String>,
    description: Option<String>,
    image_prompt: Option<String>,
    /// Models send numbers or numeric strings
    duration: Option<Value>,
    transition: Option<String>,
    effect: Option<String>,
    dialogue: Option<String>,
    narrator: Option<String>,
}

/// Normalized script as stored on disk.
#[derive(Debug, Serialize, Deserialize)]
struct ScriptFile {
    scenes: Vec<Scene>,
}

/// Remove a surrounding Markdown code fence.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```JSON"))
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Parse model output into scenes, filling missing fields.
///
/// Indices are assigned 1..=N in script order. Returns an empty list when
/// the JSON holds no scenes.
pub fn parse_script(text: &str, prompt: &str, default_duration: f64) -> Result<Vec<Scene>, serde_json::Error> {
    let raw: RawScript = serde_json::from_str(strip_code_fences(text))?;
    let raw_scenes = match raw {
        RawScript::Document { scenes } => scenes,
        RawScript::Scenes(scenes) => scenes,
    };

    Ok(raw_scenes
        .into_iter()
        .enumerate()
        .map(|(i, raw)| normalize_scene(i as u32 + 1, raw, prompt, default_duration))
        .collect())
}

fn normalize_scene(index: u32, raw: RawScene, prompt: &str, default_duration: f64) -> Scene {
    let non_empty = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let title = non_empty(raw.title).unwrap_or_else(|| format!("Scene {}", index));
    let description = non_empty(raw.description).unwrap_or_else(|| template_description(prompt));
    let image_prompt = non_empty(raw.image_prompt).unwrap_or_else(|| template_image_prompt(prompt));
    let narration = non_empty(raw.dialogue)
        .or_else(|| non_empty(raw.narrator))
        .unwrap_or_default();

    let duration = raw
        .duration
        .as_ref()
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('s').parse().ok(),
            _ => None,
        })
        .filter(|d: &f64| d.is_finite() && *d > 0.0)
        .unwrap_or(default_duration);

    let transition = raw
        .transition
        .as_deref()
        .and_then(|t| match t.parse::<Transition>() {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(scene = index, "{}, using fade", e);
                None
            }
        })
        .unwrap_or_default();

    let effect = raw
        .effect
        .as_deref()
        .and_then(|e| match e.parse::<Effect>() {
            Ok(e) => Some(e),
            Err(err) => {
                warn!(scene = index, "{}, using ken_burns", err);
                None
            }
        })
        .unwrap_or_default();

    let mut scene = Scene::new(index, title, image_prompt)
        .with_narration(narration)
        .with_duration(duration)
        .with_effect(effect);
    scene.description = description;
    scene.transition = transition;
    scene
}

fn template_description(prompt: &str) -> String {
    format!("A scene related to: {}", prompt)
}

fn template_image_prompt(prompt: &str) -> String {
    format!(
        "Cinematic scene related to {}, professional photography, high quality",
        prompt
    )
}

/// Offline script used when no language model is available.
pub fn template_scenes(prompt: &str, scene_count: u32, default_duration: f64) -> Vec<Scene> {
    info!("Creating {} template scenes", scene_count);
    (1..=scene_count.max(1))
        .map(|index| {
            let title = format!("Scene {}", index);
            let description = template_description(prompt);
            let mut scene = Scene::new(index, title.clone(), template_image_prompt(prompt))
                .with_narration(format!("{}. {}", title, description))
                .with_duration(default_duration);
            scene.description = description;
            scene
        })
        .collect()
}

/// Parse a model reply, falling back to the template when it holds no scenes.
pub fn scenes_from_reply(
    text: &str,
    prompt: &str,
    scene_count: u32,
    default_duration: f64,
) -> Result<Vec<Scene>, ProviderFailure> {
    let scenes = parse_script(text, prompt, default_duration)
        .map_err(|e| ProviderFailure::transient(format!("script is not valid JSON: {}", e)))?;

    if scenes.is_empty() {
        warn!("Script reply had no scenes, using template");
        return Ok(template_scenes(prompt, scene_count, default_duration));
    }
    Ok(scenes)
}

/// Write normalized scenes as a script artifact.
pub async fn write_script(output: &Path, scenes: &[Scene]) -> Result<Artifact, ProviderFailure> {
    let json = serde_json::to_vec_pretty(&ScriptFile {
        scenes: scenes.to_vec(),
    })
    .map_err(|e| ProviderFailure::permanent(format!("failed to encode script: {}", e)))?;

    Ok(write_bytes(output, &json)
        .await?
        .with_content_type("application/json")
        .with_metadata("scenes", scenes.len().to_string()))
}

/// Read a normalized script artifact.
pub async fn read_script(path: &Path) -> Result<Vec<Scene>, ProviderFailure> {
    let bytes = tokio::fs::read(path).await.map_err(io_failure)?;
    let file: ScriptFile = serde_json::from_slice(&bytes)
        .map_err(|e| ProviderFailure::transient(format!("malformed script artifact: {}", e)))?;
    Ok(file.scenes)
}
