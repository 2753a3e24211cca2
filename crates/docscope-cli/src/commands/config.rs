//! Configuration management CLI commands.

use std::path::Path;

use clap::{Args, Subcommand};

use docscope_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Validate the configuration
    Validate,
}

/// Execute config commands
pub fn execute(
    args: &ConfigArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = super::load_config(config_path)?;
            match format {
                OutputFormat::Json => output::print_json(&config),
                OutputFormat::Table => {
                    let plugins = &config.plugins;
                    output::print_kv("Plugin directories", &output::joined(
                        &plugins.directories.iter().map(|d| d.display()).collect::<Vec<_>>(),
                    ));
                    output::print_kv("Auto load", &plugins.auto_load.to_string());
                    output::print_kv("Enabled", &output::joined(&plugins.enabled));
                    output::print_kv(
                        "State file",
                        &plugins
                            .state_file
                            .as_ref()
                            .map_or_else(|| "-".to_string(), |p| p.display().to_string()),
                    );
                    output::print_kv("Hook timeout (s)", &plugins.hook_timeout_seconds.to_string());
                    output::print_kv(
                        "Lifecycle timeout (s)",
                        &plugins.lifecycle_timeout_seconds.to_string(),
                    );
                    output::print_kv("Fail-fast hooks", &plugins.fail_fast_hooks.to_string());
                    output::print_kv("Log level", &config.logging.level);
                    output::print_kv("Log format", &config.logging.format);
                }
            }
        }
        ConfigCommand::Validate => match super::load_config(config_path) {
            Ok(config) => {
                let source = config_path
                    .map_or_else(|| "config/default.toml".to_string(), |p| p.display().to_string());
                output::print_success(&format!("Configuration '{source}' is valid"));
                println!("  Plugin directories: {}", config.plugins.directories.len());
                println!("  Plugin settings: {}", config.plugins.settings.len());
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {e}"));
                return Err(e);
            }
        },
    }

    Ok(())
}
