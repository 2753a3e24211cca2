//! Slack notifier plugin for DocScope.
//!
//! Posts notification events to a Slack incoming webhook and announces
//! completed scans and indexing runs.

pub mod config;
pub mod message;
pub mod plugin;

use std::sync::Arc;

use docscope_plugin::{Plugin, PluginDescriptor};

pub use config::SlackConfig;
pub use plugin::SlackNotifierPlugin;

/// Catalog entry for this plugin.
pub const ENTRY: &str = "slack_notifier";

/// Descriptor the host registers with its loader.
pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::new(ENTRY, |_ctx| {
        Arc::new(SlackNotifierPlugin::new()) as Arc<dyn Plugin>
    })
}
