//! The plugin contract.
//!
//! Every plugin implements [`Plugin`]. Plugins that declare the `scanner`,
//! `processor` or `notification` capability additionally implement the
//! matching capability trait and expose it through the `as_*` accessors,
//! which is how the host checks interface satisfaction at load time.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use docscope_core::types::{
    Document, NotificationEvent, NotificationLevel, ProcessedDocument, ScanResult,
};

use crate::error::{PluginError, PluginResult};
use crate::hooks::definitions::{Hook, HookPayload};
use crate::metadata::{Capability, HealthState, PluginConfigMap, PluginMetadata};

/// Base contract shared by every plugin.
#[async_trait]
pub trait Plugin: Send + Sync + std::fmt::Debug + 'static {
    /// Static metadata. Pure; callable before `initialize`.
    fn metadata(&self) -> PluginMetadata;

    /// Acquire resources. `config` has already passed `validate_config`.
    async fn initialize(&self, config: &PluginConfigMap) -> PluginResult<()>;

    /// Release everything acquired in `initialize`. Must be idempotent.
    async fn shutdown(&self) -> PluginResult<()>;

    /// Dry-run configuration check. Defaults to the declared schema.
    fn validate_config(&self, config: &PluginConfigMap) -> PluginResult<()> {
        let metadata = self.metadata();
        metadata.config_schema.validate(&metadata.name, config)
    }

    /// Cheap, non-blocking health introspection.
    fn status(&self) -> HealthState;

    /// Handle a subscribed hook. Any returned value is reported to the caller.
    async fn on_hook(&self, hook: Hook, payload: &HookPayload) -> PluginResult<Option<Value>> {
        let _ = (hook, payload);
        Ok(None)
    }

    /// Run one of the commands declared in metadata.
    async fn execute_command(&self, command: &str, args: Value) -> PluginResult<Value> {
        let _ = args;
        Err(PluginError::CommandNotFound {
            command: command.to_string(),
        })
    }

    fn as_scanner(&self) -> Option<&dyn ScannerPlugin> {
        None
    }

    fn as_processor(&self) -> Option<&dyn ProcessorPlugin> {
        None
    }

    fn as_notifier(&self) -> Option<&dyn NotificationPlugin> {
        None
    }
}

/// Extracts documents from files.
#[async_trait]
pub trait ScannerPlugin: Plugin {
    /// Whether this scanner understands `path`.
    fn can_handle(&self, path: &Path) -> bool;

    /// Scan a single file.
    async fn scan_file(&self, path: &Path) -> PluginResult<ScanResult>;

    /// Formats (usually file extensions) this scanner accepts.
    fn supported_formats(&self) -> Vec<String>;
}

/// Transforms or enriches documents before indexing.
#[async_trait]
pub trait ProcessorPlugin: Plugin {
    fn should_process(&self, document: &Document) -> bool;

    async fn process_document(&self, document: &Document) -> PluginResult<ProcessedDocument>;
}

/// Delivers notifications to an external channel.
#[async_trait]
pub trait NotificationPlugin: Plugin {
    async fn send_notification(&self, event: &NotificationEvent) -> PluginResult<()>;

    /// Levels this notifier delivers.
    fn notification_levels(&self) -> Vec<NotificationLevel> {
        NotificationLevel::ALL.to_vec()
    }
}

/// Check that `metadata` is internally consistent and backed by `plugin`.
///
/// Returns a human-readable reason on mismatch.
pub fn verify_contract(metadata: &PluginMetadata, plugin: &dyn Plugin) -> Result<(), String> {
    if metadata.name.is_empty() {
        return Err("plugin name is empty".to_string());
    }
    if let Some(c) = metadata
        .name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(format!(
            "plugin name '{}' contains invalid character '{c}'",
            metadata.name
        ));
    }

    for capability in &metadata.capabilities {
        let backed = match capability {
            Capability::Scanner => plugin.as_scanner().is_some(),
            Capability::Processor => plugin.as_processor().is_some(),
            Capability::Notification => plugin.as_notifier().is_some(),
            Capability::Storage | Capability::Search | Capability::Api | Capability::Ui => true,
        };
        if !backed {
            return Err(format!(
                "declares capability '{capability}' but does not implement its interface"
            ));
        }
    }

    for (i, hook) in metadata.hooks.iter().enumerate() {
        if metadata.hooks[..i].contains(hook) {
            return Err(format!("hook '{hook}' is declared twice"));
        }
    }

    for (i, command) in metadata.commands.iter().enumerate() {
        if metadata.commands[..i].iter().any(|c| c.name == command.name) {
            return Err(format!("command '{}' is declared twice", command.name));
        }
    }

    if metadata.depends_on_plugin(&metadata.name) {
        return Err("plugin depends on itself".to_string());
    }

    Ok(())
}
