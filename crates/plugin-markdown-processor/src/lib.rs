//! Markdown processor plugin for DocScope.
//!
//! Enriches markdown documents before indexing: table of contents, links,
//! fenced code blocks, YAML front matter and an estimated reading time.

pub mod config;
pub mod markdown;
pub mod plugin;

use std::sync::Arc;

use docscope_plugin::{Plugin, PluginDescriptor};

pub use config::ProcessorConfig;
pub use plugin::MarkdownProcessorPlugin;

/// Catalog entry for this plugin.
pub const ENTRY: &str = "markdown_processor";

/// Descriptor the host registers with its loader.
pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::new(ENTRY, |_ctx| {
        Arc::new(MarkdownProcessorPlugin::new()) as Arc<dyn Plugin>
    })
}
