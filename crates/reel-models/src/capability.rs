//! Generation capabilities and the provider catalogue.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::asset::MediaKind;
use crate::error::{ModelError, ModelResult};

/// Kind of artifact a provider can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Scene script (JSON document)
    Script,
    /// Still image for a scene
    Image,
    /// Narration audio
    Voice,
    /// Image-to-video motion clip
    Motion,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Script,
        Capability::Image,
        Capability::Voice,
        Capability::Motion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Script => "script",
            Capability::Image => "image",
            Capability::Voice => "voice",
            Capability::Motion => "motion",
        }
    }

    /// Media kind of the artifact, `None` for scripts.
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            Capability::Script => None,
            Capability::Image => Some(MediaKind::Image),
            Capability::Voice => Some(MediaKind::Audio),
            Capability::Motion => Some(MediaKind::Video),
        }
    }

    /// File extension used for artifacts of this capability.
    pub fn extension(&self) -> &'static str {
        match self {
            Capability::Script => "json",
            Capability::Image => "png",
            Capability::Voice => "mp3",
            Capability::Motion => "mp4",
        }
    }

    /// Fixed provider ranking for this capability, best first.
    ///
    /// Credentialed providers come before the free fallbacks.
    pub fn ranking(&self) -> &'static [Provider] {
        match self {
            Capability::Script => &[Provider::OpenAi, Provider::Gemini, Provider::Template],
            Capability::Image => &[
                Provider::Stability,
                Provider::OpenAi,
                Provider::HuggingFace,
                Provider::Pollinations,
            ],
            Capability::Voice => &[Provider::ElevenLabs, Provider::OpenAi, Provider::Gtts],
            Capability::Motion => &[Provider::Runway],
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An external generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    /// Offline template script
    Template,
    Pollinations,
    Stability,
    #[serde(rename = "huggingface")]
    HuggingFace,
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
    Gtts,
    Runway,
}

impl Provider {
    pub const ALL: [Provider; 9] = [
        Provider::OpenAi,
        Provider::Gemini,
        Provider::Template,
        Provider::Pollinations,
        Provider::Stability,
        Provider::HuggingFace,
        Provider::ElevenLabs,
        Provider::Gtts,
        Provider::Runway,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Template => "template",
            Provider::Pollinations => "pollinations",
            Provider::Stability => "stability",
            Provider::HuggingFace => "huggingface",
            Provider::ElevenLabs => "elevenlabs",
            Provider::Gtts => "gtts",
            Provider::Runway => "runway",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn credential_env(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::Stability => Some("STABILITY_API_KEY"),
            Provider::HuggingFace => Some("HUGGINGFACE_API_KEY"),
            Provider::ElevenLabs => Some("ELEVENLABS_API_KEY"),
            Provider::Runway => Some("RUNWAYML_API_KEY"),
            Provider::Template | Provider::Pollinations | Provider::Gtts => None,
        }
    }

    /// Free providers work without any credential.
    pub fn requires_credential(&self) -> bool {
        self.credential_env().is_some()
    }

    /// Whether the provider implements the capability.
    pub fn supports(&self, capability: Capability) -> bool {
        capability.ranking().contains(self)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "dalle" | "dall-e" => Ok(Provider::OpenAi),
            "gemini" | "google" => Ok(Provider::Gemini),
            "template" | "free" => Ok(Provider::Template),
            "pollinations" => Ok(Provider::Pollinations),
            "stability" | "stability_ai" | "stabilityai" => Ok(Provider::Stability),
            "huggingface" | "hf" => Ok(Provider::HuggingFace),
            "elevenlabs" => Ok(Provider::ElevenLabs),
            "gtts" => Ok(Provider::Gtts),
            "runway" | "runwayml" => Ok(Provider::Runway),
            other => Err(ModelError::unknown("provider", other)),
        }
    }
}
