//! Duration reconciliation.
//!
//! Narration length is only known once audio exists, so the on-screen
//! duration and the motion tier are decided here, after media acquisition
//! and before any clip is built. Clips are then built exactly once.

use reel_models::{MediaAsset, Scene, SpeedTier};

/// Default silence kept after narration.
pub const DEFAULT_BUFFER_SECONDS: f64 = 0.5;

/// Authoritative timing for one scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciled {
    pub effective_duration: f64,
    pub speed_tier: SpeedTier,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationReconciler {
    buffer_seconds: f64,
}

impl Default for DurationReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SECONDS)
    }
}

impl DurationReconciler {
    pub fn new(buffer_seconds: f64) -> Self {
        Self {
            buffer_seconds: buffer_seconds.max(0.0),
        }
    }

    pub fn buffer_seconds(&self) -> f64 {
        self.buffer_seconds
    }

    /// Effective duration and speed tier for `scene`.
    ///
    /// Measured narration of `d` seconds yields exactly `d + buffer`,
    /// overriding the requested duration in either direction. Without
    /// measurable audio the requested duration stands.
    pub fn reconcile(&self, scene: &Scene, audio: Option<&MediaAsset>) -> Reconciled {
        let measured = audio
            .and_then(|a| a.duration_seconds)
            .filter(|d| d.is_finite() && *d > 0.0);

        let effective_duration = match measured {
            Some(d) => d + self.buffer_seconds,
            None => scene.requested_duration,
        };

        Reconciled {
            effective_duration,
            speed_tier: SpeedTier::for_duration(effective_duration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::MediaKind;

    fn audio(seconds: f64) -> MediaAsset {
        MediaAsset::new(1, MediaKind::Audio, "voice.mp3", 10_000).with_duration(seconds)
    }

    #[test]
    fn test_no_audio_keeps_requested() {
        let scene = Scene::new(1, "a", "b").with_duration(3.0);
        let r = DurationReconciler::default().reconcile(&scene, None);
        assert_eq!(r.effective_duration, 3.0);
        assert_eq!(r.speed_tier, SpeedTier::Medium);
    }

    #[test]
    fn test_audio_overrides_requested() {
        let scene = Scene::new(2, "a", "b").with_duration(3.0);
        let r = DurationReconciler::default().reconcile(&scene, Some(&audio(7.2)));
        assert!((r.effective_duration - 7.7).abs() < 1e-9);
        assert_eq!(r.speed_tier, SpeedTier::Slow);

        // Shorter narration shortens the scene too
        let long = Scene::new(3, "a", "b").with_duration(10.0);
        let r = DurationReconciler::default().reconcile(&long, Some(&audio(1.2)));
        assert!((r.effective_duration - 1.7).abs() < 1e-9);
        assert_eq!(r.speed_tier, SpeedTier::Fast);
    }

    #[test]
    fn test_unmeasured_audio_keeps_requested() {
        let scene = Scene::new(1, "a", "b").with_duration(4.0);
        let unmeasured = MediaAsset::new(1, MediaKind::Audio, "voice.mp3", 10_000);
        let r = DurationReconciler::default().reconcile(&scene, Some(&unmeasured));
        assert_eq!(r.effective_duration, 4.0);
    }

    #[test]
    fn test_effective_duration_is_audio_plus_buffer_across_range() {
        let reconciler = DurationReconciler::new(0.5);
        let scene = Scene::new(1, "a", "b");

        // d sweeps [0.1, 300] in uneven steps
        let mut d = 0.1;
        while d <= 300.0 {
            let r = reconciler.reconcile(&scene, Some(&audio(d)));
            assert_eq!(r.effective_duration, d + 0.5, "d = {}", d);
            assert!(r.effective_duration >= d + reconciler.buffer_seconds());
            assert_eq!(r.speed_tier, SpeedTier::for_duration(d + 0.5));
            d = d * 1.07 + 0.013;
        }
        let r = reconciler.reconcile(&scene, Some(&audio(300.0)));
        assert_eq!(r.effective_duration, 300.5);
    }

    #[test]
    fn test_negative_buffer_clamped() {
        assert_eq!(DurationReconciler::new(-1.0).buffer_seconds(), 0.0);
    }
}
