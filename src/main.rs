//! DocScope plugin host.
//!
//! Loads configuration, brings the plugin system up, and tears it down on
//! Ctrl-C.

use std::path::PathBuf;

use docscope::logging::init_logging;
use docscope::{build_manager, start};
use docscope_core::config::AppConfig;
use docscope_core::error::AppError;
use docscope_plugin::PluginContext;

#[tokio::main]
async fn main() {
    let config_path = std::env::var("DOCSCOPE_CONFIG").ok().map(PathBuf::from);
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);

    if let Err(e) = run(config).await {
        tracing::error!("Host error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting DocScope host v{}", env!("CARGO_PKG_VERSION"));

    let manager = build_manager(config.plugins, PluginContext::detached())?;
    let report = start(&manager).await?;
    for (name, error) in &report.failures {
        tracing::warn!(plugin = %name, error = %error, "Plugin did not start");
    }

    let status = manager.status().await;
    tracing::info!(
        total = status.total,
        commands = status.commands,
        "Plugin host ready; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::internal(format!("Failed to listen for shutdown signal: {e}")))?;

    tracing::info!("Shutdown signal received");
    let failures = manager.shutdown().await;
    if !failures.is_empty() {
        tracing::warn!(count = failures.len(), "Some plugins failed to shut down cleanly");
    }
    tracing::info!("DocScope host stopped");
    Ok(())
}
