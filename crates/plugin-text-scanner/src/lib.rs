//! Text scanner plugin for DocScope.
//!
//! Reads plain-text style files (text, markdown, reStructuredText, logs)
//! from disk and turns them into [`Document`](docscope_core::types::Document)s
//! with basic statistics attached.

pub mod config;
pub mod extract;
pub mod plugin;

use std::sync::Arc;

use docscope_plugin::{Plugin, PluginDescriptor};

pub use config::ScannerConfig;
pub use plugin::TextScannerPlugin;

/// Catalog entry for this plugin.
pub const ENTRY: &str = "text_scanner";

/// Descriptor the host registers with its loader.
pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::new(ENTRY, |ctx| {
        Arc::new(TextScannerPlugin::new(ctx.metrics.clone())) as Arc<dyn Plugin>
    })
}
