//! Manager construction and the startup sequence.

use tracing::{info, warn};

use docscope_core::config::plugin::PluginSystemConfig;
use docscope_plugin::loader::PluginLocator;
use docscope_plugin::{PluginContext, PluginDescriptor, PluginError, PluginLoader, PluginManager};

/// Descriptors for every plugin compiled into the host.
pub fn builtin_descriptors() -> Vec<PluginDescriptor> {
    vec![
        plugin_text_scanner::descriptor(),
        plugin_markdown_processor::descriptor(),
        plugin_slack_notifier::descriptor(),
    ]
}

/// A manager whose loader knows the built-in plugins.
pub fn build_manager(
    config: PluginSystemConfig,
    context: PluginContext,
) -> Result<PluginManager, PluginError> {
    let loader = PluginLoader::new(config, context);
    for descriptor in builtin_descriptors() {
        loader.register_descriptor(descriptor)?;
    }
    Ok(PluginManager::new(loader))
}

/// What happened during [`start`].
#[derive(Debug, Default)]
pub struct StartupReport {
    pub restored: Vec<String>,
    pub loaded: Vec<String>,
    pub enabled: Vec<String>,
    pub failures: Vec<(String, PluginError)>,
}

/// Bring the plugin system up.
///
/// Restores persisted state, loads every discovered candidate when
/// `auto_load` is set, then enables the names listed in `enabled`.
/// Individual failures are collected; startup continues past them.
pub async fn start(manager: &PluginManager) -> Result<StartupReport, PluginError> {
    let config = manager.loader().config().clone();
    let mut report = StartupReport::default();

    for (name, result) in manager.restore_state().await? {
        match result {
            Ok(()) => report.restored.push(name),
            Err(e) => report.failures.push((name, e)),
        }
    }

    if config.auto_load {
        for (locator, result) in manager.load_discovered().await {
            match result {
                Ok(name) => report.loaded.push(name),
                Err(e) => report.failures.push((locator.to_string(), e)),
            }
        }
    }

    for entry in &config.enabled {
        let name = match resolve_enabled_entry(manager, entry).await {
            Ok(name) => name,
            Err(e) => {
                warn!(plugin = %entry, error = %e, "Could not load plugin listed as enabled");
                report.failures.push((entry.clone(), e));
                continue;
            }
        };
        match manager.enable_plugin(&name).await {
            Ok(()) => report.enabled.push(name),
            Err(e) => {
                warn!(plugin = %name, error = %e, "Could not enable plugin");
                report.failures.push((name, e));
            }
        }
    }

    info!(
        restored = report.restored.len(),
        loaded = report.loaded.len(),
        enabled = report.enabled.len(),
        failures = report.failures.len(),
        "Plugin system started"
    );
    Ok(report)
}

/// An `enabled` entry is a registered name, or a locator to load first.
async fn resolve_enabled_entry(manager: &PluginManager, entry: &str) -> Result<String, PluginError> {
    if manager.registry().contains(entry).await {
        return Ok(entry.to_string());
    }
    let locator = if entry.contains(':') || entry.contains('/') {
        entry.parse::<PluginLocator>()?
    } else {
        PluginLocator::builtin(entry)
    };
    manager.load_plugin(&locator).await
}
