//! NeuroGuard - Main Entry Point
//!
//! Loads the scaler and classifier artifacts, verifies them with a reference
//! prediction, then serves the upload and emergency endpoints.

use anyhow::{Context, Result};
use neuroguard::{
    alert::{build_transport, AlertDispatcher},
    config::{AppConfig, LoggingConfig},
    error::Error,
    metrics::{MetricsReporter, ServiceMetrics},
    models::{InferenceService, ModelLoader},
    server::{self, AppState},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting NeuroGuard v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Artifacts: classifier={}, scaler={}",
        config.artifacts.classifier_path.display(),
        config.artifacts.scaler_path.display()
    );

    // Artifacts must load before the server binds
    let inference = match load_inference(&config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!(error = %e, "Failed to load model artifacts");
            std::process::exit(1);
        }
    };
    info!(
        "Inference service initialized: classifier={}, {} features, display columns {:?}",
        inference.classifier_name(),
        inference.expected_features(),
        inference.display_columns()
    );

    match inference.sanity_check() {
        Ok(Some(label)) => info!(seizure = label, "Startup sanity prediction succeeded"),
        Ok(None) => {}
        Err(e) => {
            error!(error = %format!("{:#}", e), "Startup sanity prediction failed");
            std::process::exit(1);
        }
    }

    // Alerting
    let transport = build_transport(&config.alert)?;
    let alerts = Arc::new(AlertDispatcher::new(transport, &config.alert));
    info!(
        "Alert dispatcher ready: transport={}, timeout={}ms",
        alerts.transport_name(),
        config.alert.timeout_ms
    );

    // Initialize metrics
    let metrics = Arc::new(ServiceMetrics::new());
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    } else {
        warn!("Periodic metrics summary disabled");
    }

    let state = AppState {
        inference,
        alerts,
        metrics: metrics.clone(),
    };
    let app = server::router(state, &config.server);
    server::serve(&config.server, app).await?;

    // Print final summary
    info!("NeuroGuard shutting down...");
    metrics.print_summary();

    Ok(())
}

fn load_inference(config: &AppConfig) -> std::result::Result<InferenceService, Error> {
    let loader = ModelLoader::with_threads(config.artifacts.onnx_threads).map_err(Error::Startup)?;
    let artifacts = loader
        .load_all(&config.artifacts, &config.inference)
        .map_err(Error::Startup)?;
    Ok(InferenceService::from_artifacts(
        artifacts,
        config.inference.display_columns.clone(),
    ))
}

/// `RUST_LOG` takes precedence over the configured level
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!(
            "neuroguard={level},tower_http={level}",
            level = logging.level
        ))
        .context("Invalid logging.level")?,
    };

    match logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}
