//! Hook dispatch CLI commands.

use std::path::Path;

use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use docscope_core::error::AppError;
use docscope_plugin::{DispatchMode, Hook, HookPayload, PluginFilter, PluginManager, PluginState};

use crate::output::{self, OutputFormat, joined};

/// Arguments for hook commands
#[derive(Debug, Args)]
pub struct HooksArgs {
    /// Hook subcommand
    #[command(subcommand)]
    pub command: HooksCommand,
}

/// Hook subcommands
#[derive(Debug, Subcommand)]
pub enum HooksCommand {
    /// List hooks and their enabled subscribers
    List,
    /// Fire a hook at every enabled subscriber
    Fire {
        hook: Hook,
        /// Payload entries as key=value; values are parsed as JSON when possible
        #[arg(short, long = "data", value_parser = parse_key_value)]
        data: Vec<(String, Value)>,
        /// Stop at the first failing subscriber
        #[arg(long)]
        fail_fast: bool,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct HookRow {
    #[tabled(rename = "Hook")]
    hook: String,
    #[tabled(rename = "Subscribers")]
    subscribers: String,
}

#[derive(Debug, Serialize, Tabled)]
struct InvocationRow {
    #[tabled(rename = "Plugin")]
    plugin: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Elapsed (ms)")]
    elapsed_ms: u128,
}

fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

/// Execute hook commands
pub async fn execute(
    args: &HooksArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let manager = super::open_manager(config_path).await?;
    let result = run(&args.command, &manager, format).await;
    super::close_manager(&manager).await;
    result
}

async fn run(command: &HooksCommand, manager: &PluginManager, format: OutputFormat) -> Result<(), AppError> {
    match command {
        HooksCommand::List => {
            let mut rows = Vec::new();
            for hook in Hook::ALL {
                let filter = PluginFilter::default()
                    .with_state(PluginState::Enabled)
                    .with_hook(hook);
                let names: Vec<String> = manager
                    .list_plugins(Some(&filter))
                    .await
                    .into_iter()
                    .map(|p| p.name)
                    .collect();
                rows.push(HookRow {
                    hook: hook.to_string(),
                    subscribers: joined(&names),
                });
            }
            output::print_list(&rows, &rows, format);
        }
        HooksCommand::Fire {
            hook,
            data,
            fail_fast,
        } => {
            let mut payload = HookPayload::new();
            for (key, value) in data {
                payload = payload.with_data(key, value.clone());
            }
            let mode = if *fail_fast {
                DispatchMode::FailFast
            } else {
                DispatchMode::BestEffort
            };

            let report = manager.execute_hook_with(*hook, &payload, mode).await;
            let rows: Vec<InvocationRow> = report
                .invocations
                .iter()
                .map(|i| InvocationRow {
                    plugin: i.plugin.clone(),
                    result: match &i.result {
                        Ok(Some(value)) => value.to_string(),
                        Ok(None) => "ok".to_string(),
                        Err(e) => format!("error: {e}"),
                    },
                    elapsed_ms: i.elapsed.as_millis(),
                })
                .collect();
            output::print_list(&rows, &rows, format);

            if report.halted {
                output::print_warning("Dispatch halted at the first failure");
            }
            let failures = report.failures().count();
            if failures > 0 {
                return Err(AppError::plugin(format!(
                    "{failures} subscriber(s) of '{hook}' failed"
                )));
            }
        }
    }
    Ok(())
}
