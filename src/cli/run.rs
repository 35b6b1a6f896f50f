use crate::config::parse::load_config;
use crate::pipeline::Pipeline;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/gulpd/config.yml");
            eprintln!("  /etc/gulpd/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'gulpd config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_pipeline(&config_path).await.map_err(|e| e.into())
}

async fn run_pipeline(config_path: &Path) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    if config.trigger.enabled {
        info!("Triggering enabled");
    } else {
        warn!("Triggering disabled, candidates will be named but not sent");
    }

    let mut pipeline = Pipeline::from_config(&config).await?;

    let bound = pipeline.bind().await;
    for (source, addr) in config.sources.iter().zip(pipeline.local_addrs()) {
        match addr {
            Some(addr) => info!(source_id = %source.id, addr = %addr, "Listening"),
            None => error!(source_id = %source.id, addr = %source.listen, "Not listening, will retry"),
        }
    }
    info!(bound = bound, expected = config.sources.len(), "Pipeline started, press Ctrl+C to shutdown");

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Could not listen for shutdown signal"),
        }
        signal_token.cancel();
    });

    pipeline.run(&cancel).await;

    info!("Pipeline shutdown complete");
    Ok(())
}
