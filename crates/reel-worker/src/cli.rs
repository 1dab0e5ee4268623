//! CLI argument parsing with clap.

use std::path::PathBuf;

use clap::Parser;
use reel_models::{Provider, ProviderPreferences, VideoRequest};
use reel_providers::parse_script;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Generate a narrated video from a prompt or a scene list
#[derive(Parser, Debug)]
#[command(name = "reel-worker")]
#[command(version, about = "Narrated video generation", long_about = None)]
pub struct Args {
    /// Idea to turn into a scripted video
    #[arg(long, required_unless_present = "scenes", conflicts_with = "scenes")]
    pub prompt: Option<String>,

    /// JSON scene list ({"scenes": [...]} or a bare array)
    #[arg(long)]
    pub scenes: Option<PathBuf>,

    /// Number of scenes to script
    #[arg(long, default_value = "5")]
    pub scene_count: u32,

    /// Output video path
    #[arg(long, short)]
    pub output: PathBuf,

    /// Background music, looped under the narration
    #[arg(long, short)]
    pub music: Option<PathBuf>,

    /// Config file path (TOML)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Image provider to try first (repeatable)
    #[arg(long = "image-provider")]
    pub image_providers: Vec<Provider>,

    /// Voice provider to try first (repeatable)
    #[arg(long = "voice-provider")]
    pub voice_providers: Vec<Provider>,

    /// Fall back to the full provider ranking after the requested providers
    #[arg(long)]
    pub full_ranking: bool,
}

impl Args {
    /// Provider preferences: configured lists, overridden per capability by flags.
    pub fn preferences(&self, config: &WorkerConfig) -> ProviderPreferences {
        let mut preferences = config.preferences();
        if !self.image_providers.is_empty() {
            preferences.image = self.image_providers.clone();
        }
        if !self.voice_providers.is_empty() {
            preferences.voice = self.voice_providers.clone();
        }
        preferences.use_full_ranking |= self.full_ranking;
        preferences
    }

    /// Build the request for this invocation.
    pub async fn video_request(&self, config: &WorkerConfig) -> WorkerResult<VideoRequest> {
        let request = match (&self.scenes, &self.prompt) {
            (Some(path), _) => {
                let text = tokio::fs::read_to_string(path).await?;
                let topic = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().replace(['-', '_'], " "))
                    .unwrap_or_default();
                let scenes = parse_script(&text, &topic, config.default_scene_duration)?;
                if scenes.is_empty() {
                    return Err(WorkerError::invalid_request(format!(
                        "{} contains no scenes",
                        path.display()
                    )));
                }
                VideoRequest::from_scenes(scenes, &self.output)
            }
            (None, Some(prompt)) => VideoRequest::from_prompt(prompt, &self.output).with_scene_count(self.scene_count),
            (None, None) => return Err(WorkerError::invalid_request("either --prompt or --scenes is required")),
        };

        let request = request.with_preferences(self.preferences(config));
        Ok(match &self.music {
            Some(music) => request.with_music(music),
            None => request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_prompt_args() {
        let args = Args::parse_from([
            "reel-worker",
            "--prompt",
            "a day at sea",
            "-o",
            "out.mp4",
            "--image-provider",
            "stability",
            "--image-provider",
            "pollinations",
        ]);
        assert_eq!(args.prompt.as_deref(), Some("a day at sea"));
        assert_eq!(args.scene_count, 5);
        assert_eq!(args.image_providers, vec![Provider::Stability, Provider::Pollinations]);

        let prefs = args.preferences(&WorkerConfig::default());
        assert_eq!(prefs.image.len(), 2);
        assert!(prefs.voice.is_empty());
        assert!(!prefs.use_full_ranking);
    }

    #[test]
    fn test_prompt_or_scenes_required() {
        assert!(Args::try_parse_from(["reel-worker", "-o", "out.mp4"]).is_err());
        assert!(Args::try_parse_from(["reel-worker", "--prompt", "x", "--scenes", "s.json", "-o", "o.mp4"]).is_err());
    }

    #[tokio::test]
    async fn test_scene_file_request() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"scenes": [{{"title": "Harbor", "image_prompt": "boats", "duration": "4s", "narrator": "Morning."}}]}}"#
        )
        .unwrap();

        let args = Args::parse_from([
            "reel-worker",
            "--scenes",
            file.path().to_str().unwrap(),
            "-o",
            "out.mp4",
            "--full-ranking",
        ]);
        let request = args.video_request(&WorkerConfig::default()).await.unwrap();

        let scenes = request.scenes.unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].index, 1);
        assert_eq!(scenes[0].requested_duration, 4.0);
        assert_eq!(scenes[0].narration_text, "Morning.");
        assert!(request.preferences.unwrap().use_full_ranking);
    }
}
