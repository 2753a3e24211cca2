//! Plugin management CLI commands.

use std::path::Path;

use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use docscope_core::error::AppError;
use docscope_plugin::loader::PluginLocator;
use docscope_plugin::{
    Capability, PluginError, PluginFilter, PluginInfo, PluginManager, PluginState,
};

use crate::output::{self, OutputFormat, joined};

/// Arguments for plugin commands
#[derive(Debug, Args)]
pub struct PluginsArgs {
    /// Plugin subcommand
    #[command(subcommand)]
    pub command: PluginsCommand,
}

/// Plugin subcommands
#[derive(Debug, Subcommand)]
pub enum PluginsCommand {
    /// List registered plugins
    List {
        /// Only plugins in this state
        #[arg(long)]
        state: Option<PluginState>,
        /// Only plugins with this capability
        #[arg(long)]
        capability: Option<Capability>,
    },
    /// Show one plugin in detail
    Info { name: String },
    /// List plugin candidates without loading them
    Discover,
    /// Load a plugin from a locator (`builtin:<entry>` or a manifest path)
    Load { locator: String },
    /// Enable a loaded plugin
    Enable { name: String },
    /// Disable an enabled plugin
    Disable { name: String },
    /// Unload a plugin
    Unload { name: String },
    /// Unload and load a plugin again
    Reload { name: String },
    /// Search plugins by name, description or tag
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Run a plugin-provided command
    Run {
        command: String,
        /// JSON arguments
        #[arg(short, long, default_value = "null")]
        args: String,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct PluginRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Health")]
    health: String,
    #[tabled(rename = "Capabilities")]
    capabilities: String,
    #[tabled(rename = "Hooks")]
    hooks: String,
}

impl From<&PluginInfo> for PluginRow {
    fn from(info: &PluginInfo) -> Self {
        Self {
            name: info.name.clone(),
            version: info.version.clone(),
            state: info.state.to_string(),
            health: info.health.to_string(),
            capabilities: joined(&info.capabilities),
            hooks: joined(&info.hooks),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct CandidateRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Locator")]
    locator: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Execute plugin commands
pub async fn execute(
    args: &PluginsArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let manager = super::open_manager(config_path).await?;
    let result = run(&args.command, &manager, format).await;
    super::close_manager(&manager).await;
    result
}

async fn run(
    command: &PluginsCommand,
    manager: &PluginManager,
    format: OutputFormat,
) -> Result<(), AppError> {
    match command {
        PluginsCommand::List { state, capability } => {
            let mut filter = PluginFilter::default();
            if let Some(state) = state {
                filter = filter.with_state(*state);
            }
            if let Some(capability) = capability {
                filter = filter.with_capability(*capability);
            }
            print_plugins(&manager.list_plugins(Some(&filter)).await, format);
        }
        PluginsCommand::Info { name } => {
            let info = manager.get_plugin_info(name).await?;
            print_info(&info, format);
        }
        PluginsCommand::Discover => {
            let candidates: Vec<CandidateRow> = manager
                .discover()
                .map(|c| CandidateRow {
                    name: c.name.unwrap_or_else(|| "?".to_string()),
                    locator: c.locator.to_string(),
                    description: c.description.unwrap_or_default(),
                })
                .collect();
            output::print_list(&candidates, &candidates, format);
        }
        PluginsCommand::Load { locator } => {
            let locator: PluginLocator = locator.parse()?;
            match manager.load_plugin(&locator).await {
                Ok(name) => output::print_success(&format!("Loaded plugin '{name}' from {locator}")),
                Err(PluginError::AlreadyRegistered { name }) => {
                    output::print_warning(&format!("Plugin '{name}' is already loaded"));
                }
                Err(e) => return Err(e.into()),
            }
        }
        PluginsCommand::Enable { name } => {
            manager.enable_plugin(name).await?;
            output::print_success(&format!("Enabled plugin '{name}'"));
        }
        PluginsCommand::Disable { name } => {
            manager.disable_plugin(name).await?;
            output::print_success(&format!("Disabled plugin '{name}'"));
        }
        PluginsCommand::Unload { name } => {
            manager.unload_plugin(name).await?;
            output::print_success(&format!("Unloaded plugin '{name}'"));
        }
        PluginsCommand::Reload { name } => {
            manager.reload_plugin(name).await?;
            output::print_success(&format!("Reloaded plugin '{name}'"));
        }
        PluginsCommand::Search { query, limit } => {
            print_plugins(&manager.search_plugins(query, *limit).await, format);
        }
        PluginsCommand::Run { command, args } => {
            let args: Value = serde_json::from_str(args)
                .map_err(|e| AppError::validation(format!("--args is not valid JSON: {e}")))?;
            let out = manager.execute_command(command, args).await?;
            output::print_json(&out);
        }
    }
    Ok(())
}

fn print_plugins(plugins: &[PluginInfo], format: OutputFormat) {
    let rows: Vec<PluginRow> = plugins.iter().map(PluginRow::from).collect();
    output::print_list(&rows, plugins, format);
}

fn print_info(info: &PluginInfo, format: OutputFormat) {
    if format == OutputFormat::Json {
        output::print_json(info);
        return;
    }
    println!("{} v{}", info.name, info.version);
    output::print_kv("State", info.state.as_str());
    output::print_kv("Health", &info.health.to_string());
    output::print_kv("Author", &info.author);
    output::print_kv("Description", &info.description);
    output::print_kv("Tags", &joined(&info.tags));
    output::print_kv("Capabilities", &joined(&info.capabilities));
    output::print_kv("Dependencies", &joined(&info.dependencies));
    output::print_kv("Hooks", &joined(&info.hooks));
    output::print_kv("Commands", &joined(&info.commands));
    output::print_kv("Source", info.source.as_deref().unwrap_or("-"));
    output::print_kv("Loaded at", &info.loaded_at.to_rfc3339());
    if let Some(error) = &info.last_error {
        output::print_kv("Last error", error);
    }
}
