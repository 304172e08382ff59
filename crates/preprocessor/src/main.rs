//! Preprocessor - training job and inference server
//!
//! `train` fits the standardization pipeline and exits; `serve` loads the
//! artifact and answers invocations until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use preprocessor::{api, config::ServeConfig, train, Cli, Command};
use preprocessor_lib::{
    health::{components, HealthRegistry},
    observability::{ServingMetrics, StructuredLogger},
    Apply, InferenceAdapter, PreprocessError,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PREPROCESSOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Train(args) => run_training(args).await,
        Command::Serve { model_dir, port } => run_server(model_dir, port).await,
    }
}

async fn run_training(args: train::TrainArgs) -> Result<()> {
    let logger = StructuredLogger::new(
        std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
    );

    let result = tokio::task::spawn_blocking(move || train::run(&args))
        .await
        .context("Training task panicked")?;

    if let Err(e) = &result {
        let code = e
            .downcast_ref::<PreprocessError>()
            .map(PreprocessError::code)
            .unwrap_or("training_error");
        logger.log_training_failed(code, &format!("{:#}", e));
    }

    result.map(|_| ())
}

async fn run_server(model_dir: Option<PathBuf>, port: Option<u16>) -> Result<()> {
    info!("Starting preprocessor server");

    // Load configuration, command-line flags win over the environment
    let mut config = ServeConfig::load()?;
    if let Some(model_dir) = model_dir {
        config.model_dir = model_dir;
    }
    if let Some(port) = port {
        config.port = port;
    }
    let default_accept = config.default_accept_type()?;
    info!(model_dir = %config.model_dir.display(), port = config.port, "Server configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::MODEL).await;
    health_registry.register(components::INVOCATIONS).await;

    let metrics = ServingMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);
    let model_dir = config.model_dir.display().to_string();
    logger.log_startup(PREPROCESSOR_VERSION, &model_dir);

    // A missing or corrupt artifact prevents serving from starting
    let adapter = InferenceAdapter::load(&config.model_dir, config.schema())
        .with_context(|| format!("Failed to load model from {}", model_dir))?;

    let kind = adapter
        .model()
        .steps
        .first()
        .map(|step| step.kind())
        .unwrap_or("identity");
    let samples = adapter
        .model()
        .standard_params()
        .map(|p| p.n_samples_seen)
        .unwrap_or(0);
    let adapter_features = adapter.model().n_features();
    metrics.set_model_info(kind, adapter_features);
    logger.log_model_loaded(&model_dir, kind, adapter_features, samples);

    let app_state = Arc::new(api::AppState {
        adapter: Arc::new(adapter),
        health_registry: health_registry.clone(),
        metrics,
        logger: logger.clone(),
        default_accept,
        endpoint_name: config.endpoint_name.clone(),
        max_payload_bytes: config.max_payload_bytes,
    });

    health_registry
        .mark_model_loaded(kind, adapter_features)
        .await;

    let api_handle = tokio::spawn(api::serve(config.port, app_state));

    tokio::select! {
        result = api_handle => {
            result.context("API server task panicked")??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
