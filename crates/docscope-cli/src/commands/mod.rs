//! CLI command definitions and dispatch.

pub mod config;
pub mod hooks;
pub mod plugins;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use docscope_core::config::AppConfig;
use docscope_core::error::AppError;
use docscope_plugin::{PluginContext, PluginManager};

use crate::output::{self, OutputFormat};

/// DocScope — document indexing plugin management
#[derive(Debug, Parser)]
#[command(name = "docscope", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (merged over config/default.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Plugin management
    Plugins(plugins::PluginsArgs),
    /// Hook dispatch
    Hooks(hooks::HooksArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Plugins(args) => plugins::execute(args, self.config.as_deref(), self.format).await,
            Commands::Hooks(args) => hooks::execute(args, self.config.as_deref(), self.format).await,
            Commands::Config(args) => config::execute(args, self.config.as_deref(), self.format),
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: Option<&std::path::Path>) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
}

/// Helper: bring the plugin system up for one command.
///
/// Startup problems are reported as warnings so that management commands
/// can still inspect and fix a partly broken setup.
pub async fn open_manager(config_path: Option<&std::path::Path>) -> Result<PluginManager, AppError> {
    let config = load_config(config_path)?;
    let manager = docscope::build_manager(config.plugins, PluginContext::detached())?;
    let report = docscope::start(&manager).await?;
    for (name, error) in &report.failures {
        output::print_warning(&format!("{name}: {error}"));
    }
    Ok(manager)
}

/// Helper: tear the plugin system down, keeping persisted state intact.
pub async fn close_manager(manager: &PluginManager) {
    for (name, error) in manager.shutdown().await {
        output::print_warning(&format!("{name} did not shut down cleanly: {error}"));
    }
}
