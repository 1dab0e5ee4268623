//! Narrated video pipeline worker.
//!
//! This crate provides:
//! - Layered worker configuration
//! - Per-scene media acquisition over the provider chain
//! - Duration reconciliation and the scene/run state machines
//! - The pipeline that builds, joins and renders the timeline
//! - Structured run logging

pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod reconcile;
pub mod state;

#[cfg(test)]
mod testing;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use generator::{ChainConfig, DegradedNarration, GeneratorSettings, SceneMedia, SceneMediaGenerator};
pub use logging::RunLogger;
pub use pipeline::{Pipeline, RunReport};
pub use reconcile::{DurationReconciler, Reconciled};
pub use state::{PipelineState, RunStatus, SceneState};
