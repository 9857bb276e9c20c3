use agingwell::cli::{self, Cli, CliSample, Commands};
use agingwell::config::AppConfig;
use agingwell::logging::{init_logging, init_logging_simple};
use agingwell::ml::{ActivationPolicy, ModelArtifact};
use agingwell::services::{AppState, PredictionServer};
use anyhow::{anyhow, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.clone().unwrap_or_default() {
        Commands::Serve { model, port } => {
            run_serve(&cli.config, model, port).await?;
        }
        Commands::Predict {
            model,
            features,
            named,
            zeros,
            strict,
        } => {
            init_logging_simple();
            let sample = CliSample::from_args(features, named, zeros);
            let result = cli::run_predict(&model, sample, ActivationPolicy::from_strict_flag(strict))
                .with_context(|| format!("prediction with {} failed", model.display()))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Inspect { model, strict } => {
            init_logging_simple();
            let summary = cli::run_inspect(&model, ActivationPolicy::from_strict_flag(strict))
                .with_context(|| format!("failed to load {}", model.display()))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

async fn run_serve(
    config_dir: &Path,
    model_override: Option<PathBuf>,
    port_override: Option<u16>,
) -> anyhow::Result<()> {
    let mut cfg = AppConfig::load_from(config_dir)
        .with_context(|| format!("failed to load configuration from {}", config_dir.display()))?;
    if let Some(path) = model_override {
        cfg.model.path = path;
    }
    if let Some(port) = port_override {
        cfg.server.port = port;
    }
    cfg.validate()
        .map_err(|errors| anyhow!("invalid configuration: {}", errors.join("; ")))?;

    init_logging(&cfg.logging);

    // A service without a valid model must not start.
    let model = match ModelArtifact::from_file(&cfg.model.path, cfg.model.activation_policy()) {
        Ok(m) => m,
        Err(e) => {
            error!(
                model_path = %cfg.model.path.display(),
                error = %e,
                "failed to load model export; refusing to serve"
            );
            return Err(e).with_context(|| format!("failed to load {}", cfg.model.path.display()));
        }
    };

    let state = AppState::new(model, cfg.service.clone());
    PredictionServer::new(state, cfg.server.host.clone(), cfg.server.port)
        .run(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
