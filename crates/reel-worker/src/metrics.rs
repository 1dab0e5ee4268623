//! Pipeline metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const SCENES_BUILT_TOTAL: &str = "reel_scenes_built_total";
    pub const SCENES_DEGRADED_TOTAL: &str = "reel_scenes_degraded_total";
    pub const RENDER_DURATION_SECONDS: &str = "reel_render_duration_seconds";
    pub const RUNS_TOTAL: &str = "reel_runs_total";
}

/// Record one scene clip built.
pub fn record_scene_built(with_narration: bool) {
    let labels = [("narrated", with_narration.to_string())];
    counter!(names::SCENES_BUILT_TOTAL, &labels).increment(1);
}

/// Record a scene rendered without its narration.
pub fn record_scene_degraded() {
    counter!(names::SCENES_DEGRADED_TOTAL).increment(1);
}

/// Record a finished run and its wall time.
pub fn record_run(outcome: &'static str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::RUNS_TOTAL, &labels).increment(1);
    histogram!(names::RENDER_DURATION_SECONDS, &labels).record(duration_secs);
}
