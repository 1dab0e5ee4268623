//! Run and scene logging.
//!
//! A run's events sit under a `run` span (run id, operation). Each scene's
//! work runs under a child `scene` span, so interleaved scenes can be told
//! apart in JSON logs without repeating the index in every message.

use reel_models::{Scene, SpeedTier, VideoRequest};
use reel_providers::ProviderAttempts;
use tracing::{error, info, info_span, warn, Span};
use uuid::Uuid;

use crate::error::WorkerError;
use crate::generator::DegradedNarration;
use crate::pipeline::RunReport;
use crate::state::RunStatus;

/// Emits the lifecycle events of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    operation: String,
}

impl RunLogger {
    /// Logger with a fresh run id.
    pub fn new(operation: &str) -> Self {
        Self::with_run_id(&Uuid::new_v4().to_string(), operation)
    }

    pub fn with_run_id(run_id: &str, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_span(&self) -> Span {
        info_span!("run", run_id = %self.run_id, operation = %self.operation)
    }

    /// Child of the current span; enter it while working on `scene`.
    pub fn scene_span(&self, scene: &Scene) -> Span {
        info_span!("scene", scene_index = scene.index, title = %scene.title)
    }

    pub fn run_started(&self, request: &VideoRequest) {
        let source = match &request.scenes {
            Some(scenes) if !scenes.is_empty() => "scenes",
            _ => "prompt",
        };
        info!(
            source,
            prompt = request.prompt.as_deref().unwrap_or_default(),
            output = %request.output_path.display(),
            music = request.background_music.is_some(),
            "Run started"
        );
    }

    pub fn scenes_resolved(&self, scenes: &[Scene]) {
        let narrated = scenes.iter().filter(|s| s.has_narration()).count();
        let requested_seconds: f64 = scenes.iter().map(|s| s.requested_duration).sum();
        info!(
            scenes = scenes.len(),
            narrated,
            requested_seconds,
            "Scenes resolved"
        );
    }

    /// A narrated scene falling back to silence. Always a warning.
    pub fn scene_degraded(&self, scene: &Scene, failure: &DegradedNarration) {
        warn!(
            scene_index = scene.index,
            duration = scene.requested_duration,
            providers = %ledger_summary(&failure.ledger),
            "Narration unavailable, scene renders silent: {}",
            failure.reason
        );
    }

    pub fn scene_built(&self, scene_index: u32, effective_duration: f64, tier: SpeedTier, narrated: bool) {
        info!(
            scene_index,
            effective_duration,
            tier = tier.as_str(),
            narrated,
            "Scene clip built"
        );
    }

    /// The run entered `status.state`.
    pub fn stage(&self, status: &RunStatus) {
        info!(
            stage = status.state.as_str(),
            scenes_built = status.scenes_built,
            progress = status.progress(),
            "Pipeline stage"
        );
    }

    pub fn run_completed(&self, report: &RunReport, elapsed_secs: f64) {
        info!(
            run_id = %self.run_id,
            output = %report.output.path.display(),
            duration = report.timeline.total_duration(),
            scenes = report.timeline.len(),
            silent_scenes = ?report.status.degraded_scenes,
            elapsed_secs,
            "Run completed"
        );
    }

    pub fn run_failed(&self, err: &WorkerError, elapsed_secs: f64) {
        error!(
            run_id = %self.run_id,
            capability = ?err.capability(),
            retryable = err.is_retryable(),
            providers = %ledger_summary(err.attempts()),
            elapsed_secs,
            "Run failed: {}",
            err
        );
    }
}

/// `provider:kind×attempts` per ledger entry, in try order.
pub fn ledger_summary(ledger: &[ProviderAttempts]) -> String {
    if ledger.is_empty() {
        return "none".to_string();
    }
    ledger
        .iter()
        .map(|entry| match entry.final_kind() {
            Some(kind) => format!("{}:{}×{}", entry.provider, kind, entry.failures.len()),
            None => entry.provider.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
