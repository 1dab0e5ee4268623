//! Scene and run state machines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{WorkerError, WorkerResult};

/// Progress of one scene.
///
/// `Pending → ImageGenerating → ImageReady → [AudioGenerating] →
/// DurationReconciled → ClipBuilt`. Audio is skipped for scenes without
/// narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SceneState {
    #[default]
    Pending,
    ImageGenerating,
    ImageReady,
    AudioGenerating,
    DurationReconciled,
    ClipBuilt,
}

impl SceneState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneState::Pending => "pending",
            SceneState::ImageGenerating => "image_generating",
            SceneState::ImageReady => "image_ready",
            SceneState::AudioGenerating => "audio_generating",
            SceneState::DurationReconciled => "duration_reconciled",
            SceneState::ClipBuilt => "clip_built",
        }
    }

    pub fn can_transition_to(&self, next: SceneState) -> bool {
        use SceneState::*;
        matches!(
            (self, next),
            (Pending, ImageGenerating)
                | (ImageGenerating, ImageReady)
                | (ImageReady, AudioGenerating)
                | (ImageReady, DurationReconciled)
                | (AudioGenerating, DurationReconciled)
                | (DurationReconciled, ClipBuilt)
        )
    }

    /// Move to `next`, rejecting out-of-order steps.
    pub fn advance(self, next: SceneState) -> WorkerResult<SceneState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(WorkerError::invalid_request(format!(
                "scene cannot move from {} to {}",
                self, next
            )))
        }
    }
}

impl std::fmt::Display for SceneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Scenes are being generated and built
    #[default]
    Collecting,
    Concatenating,
    MusicMixing,
    Rendering,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Collecting => "collecting",
            PipelineState::Concatenating => "concatenating",
            PipelineState::MusicMixing => "music_mixing",
            PipelineState::Rendering => "rendering",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Collecting, Concatenating)
                | (Concatenating, MusicMixing)
                | (Concatenating, Rendering)
                | (MusicMixing, Rendering)
                | (Rendering, Done)
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of a run's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: String,
    pub state: PipelineState,
    pub scenes_built: u32,
    pub scenes_total: u32,
    /// Scenes rendered without narration because voice generation failed
    pub degraded_scenes: Vec<u32>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunStatus {
    pub fn new(run_id: impl Into<String>, scenes_total: u32) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.into(),
            state: PipelineState::Collecting,
            scenes_built: 0,
            scenes_total,
            degraded_scenes: Vec::new(),
            error_message: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Move the run to `next`.
    pub fn set_state(&mut self, next: PipelineState) -> WorkerResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(WorkerError::invalid_request(format!(
                "run cannot move from {} to {}",
                self.state, next
            )));
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn scene_built(&mut self, degraded_scene: Option<u32>) {
        self.scenes_built += 1;
        if let Some(index) = degraded_scene {
            self.degraded_scenes.push(index);
            self.degraded_scenes.sort_unstable();
        }
        self.updated_at = Utc::now();
    }

    /// Mark the run as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        if !self.state.is_terminal() {
            self.state = PipelineState::Failed;
        }
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
    }

    /// Progress percentage (0-100) across scene building.
    pub fn progress(&self) -> u8 {
        if self.state == PipelineState::Done {
            return 100;
        }
        if self.scenes_total == 0 {
            return 0;
        }
        // Scene building covers the first 90%
        ((u64::from(self.scenes_built) * 90) / u64::from(self.scenes_total)).min(90) as u8
    }
}
