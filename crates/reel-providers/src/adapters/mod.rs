//! Built-in provider adapters.

pub mod elevenlabs;
pub mod gemini;
pub mod gtts;
pub mod http;
pub mod huggingface;
pub mod openai;
pub mod pollinations;
pub mod runway;
pub mod stability;
pub mod template;

pub use elevenlabs::ElevenLabsVoice;
pub use gemini::GeminiScript;
pub use gtts::GttsVoice;
pub use huggingface::HuggingFaceImage;
pub use openai::{OpenAiClient, OpenAiImage, OpenAiScript, OpenAiSpeech};
pub use pollinations::PollinationsImage;
pub use runway::RunwayMotion;
pub use stability::StabilityImage;
pub use template::TemplateScript;

/// Screenwriting instructions shared by the language model adapters.
pub(crate) fn script_prompt(prompt: &str, scene_count: u32, default_duration: f64) -> String {
    format!(
        r#"Write a script for a short narrated video about: {prompt}

Return ONLY a single JSON object with this schema:
{{
  "scenes": [
    {{
      "title": "Short scene title",
      "description": "What happens in the scene",
      "image_prompt": "Detailed visual prompt for an image generator",
      "duration": {default_duration},
      "transition": "fade | cut | zoom | pan",
      "effect": "ken_burns | zoom_in | zoom_out | pan_left | pan_right | static",
      "dialogue": "Line spoken by a character, empty if none",
      "narrator": "Narration read over the scene"
    }}
  ]
}}

Additional instructions:
- Write exactly {scene_count} scenes in story order.
- Keep each narration under 40 words.
- Image prompts must describe a single still frame.
"#
    )
}
