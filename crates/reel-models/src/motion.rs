//! Motion speed tiers.
//!
//! Zoom and pan speed scale with scene length so that motion stays
//! proportional: short scenes move quickly over a wide extent, long scenes
//! drift slowly over a narrow one.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Scenes shorter than this use the fast tier.
pub const FAST_TIER_MAX_SECONDS: f64 = 2.0;
/// Scenes longer than this use the slow tier.
pub const SLOW_TIER_MIN_SECONDS: f64 = 5.0;

/// Motion parameters driving pan/zoom filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MotionProfile {
    /// Multiplier applied to clip progress for the zoom ramp
    pub zoom_speed: f64,
    /// Multiplier applied to clip progress for the pan ramp
    pub pan_speed: f64,
    /// Maximum additional zoom (0.2 = 120%)
    pub zoom_extent: f64,
}

/// Speed tier selected from a scene's effective duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SpeedTier {
    Fast,
    Medium,
    Slow,
}

impl SpeedTier {
    /// Tier for a clip duration in seconds.
    pub fn for_duration(seconds: f64) -> Self {
        if seconds < FAST_TIER_MAX_SECONDS {
            SpeedTier::Fast
        } else if seconds <= SLOW_TIER_MIN_SECONDS {
            SpeedTier::Medium
        } else {
            SpeedTier::Slow
        }
    }

    pub fn profile(&self) -> MotionProfile {
        match self {
            SpeedTier::Fast => MotionProfile {
                zoom_speed: 0.8,
                pan_speed: 0.6,
                zoom_extent: 0.30,
            },
            SpeedTier::Medium => MotionProfile {
                zoom_speed: 1.0,
                pan_speed: 0.8,
                zoom_extent: 0.20,
            },
            SpeedTier::Slow => MotionProfile {
                zoom_speed: 1.2,
                pan_speed: 1.0,
                zoom_extent: 0.15,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedTier::Fast => "fast",
            SpeedTier::Medium => "medium",
            SpeedTier::Slow => "slow",
        }
    }
}
