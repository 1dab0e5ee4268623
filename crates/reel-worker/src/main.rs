//! Narrated video worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_providers::CredentialStore;
use reel_worker::cli::Args;
use reel_worker::{Pipeline, RunLogger, WorkerConfig, WorkerError};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();
    info!("Starting reel-worker");

    let config = match WorkerConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Worker config: {:?}", config);

    install_metrics_exporter();

    let credentials = CredentialStore::from_env();
    info!(
        "Usable providers: {}",
        credentials
            .available()
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let pipeline = match Pipeline::from_config(config, Arc::new(credentials)) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Failed to create pipeline: {}", e);
            std::process::exit(1);
        }
    };

    let request = match args.video_request(pipeline.config()).await {
        Ok(request) => request,
        Err(e) => {
            error!("Invalid request: {}", e);
            std::process::exit(1);
        }
    };

    let logger = RunLogger::new("narrated_video");
    let result = tokio::select! {
        result = pipeline.run(&request, &logger) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            let run_dir = pipeline.run_dir(logger.run_id());
            if let Err(e) = tokio::fs::remove_dir_all(&run_dir).await {
                warn!("Failed to remove {}: {}", run_dir.display(), e);
            }
            Err(WorkerError::Cancelled)
        }
    };

    match result {
        Ok(report) => {
            info!(
                output = %report.output.path.display(),
                manifest = %report.manifest_path.display(),
                duration = report.output.duration_seconds,
                degraded_scenes = ?report.status.degraded_scenes,
                "Video ready"
            );
        }
        Err(WorkerError::Cancelled) => {
            warn!(run_id = logger.run_id(), "Run cancelled");
            std::process::exit(1);
        }
        // Logged with its failure ledger by the run logger
        Err(_) => std::process::exit(1),
    }
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "reel=info".parse::<Directive>() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Serve Prometheus metrics when `REEL_METRICS_ADDR` is set.
fn install_metrics_exporter() {
    let Ok(addr) = std::env::var("REEL_METRICS_ADDR") else {
        return;
    };
    let addr: SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Ignoring REEL_METRICS_ADDR={}: {}", addr, e);
            return;
        }
    };
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => info!("Serving metrics on http://{}/metrics", addr),
        Err(e) => warn!("Failed to install metrics exporter: {}", e),
    }
}
