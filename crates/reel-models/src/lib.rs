//! Shared data models for the narrated video pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Scenes, transitions and visual effects
//! - Generation capabilities and the provider catalogue
//! - Generated media assets and the reconciled timeline
//! - Render configuration and the scene manifest

pub mod asset;
pub mod capability;
pub mod error;
pub mod manifest;
pub mod motion;
pub mod render;
pub mod request;
pub mod scene;
pub mod timeline;

// Re-export common types
pub use asset::{MediaAsset, MediaKind};
pub use capability::{Capability, Provider};
pub use error::{ModelError, ModelResult};
pub use manifest::{ManifestScene, ScriptManifest};
pub use motion::{MotionProfile, SpeedTier};
pub use render::RenderConfig;
pub use request::{ProviderPreferences, VideoRequest};
pub use scene::{validate_scenes, Effect, Scene, Transition};
pub use timeline::{Timeline, TimelineSegment};
