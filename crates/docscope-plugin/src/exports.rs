//! Plugin descriptors — the registration entry point each plugin crate exports.
//!
//! A plugin crate exposes `pub fn descriptor() -> PluginDescriptor`. The
//! host registers descriptors with the loader; nothing from the plugin
//! runs until the loader instantiates it through the factory.

use std::sync::Arc;

use crate::api::context::PluginContext;
use crate::contract::Plugin;

/// Constructs a plugin instance from the host context.
pub type PluginFactory = Arc<dyn Fn(&PluginContext) -> Arc<dyn Plugin> + Send + Sync>;

/// A named factory for one plugin implementation.
#[derive(Clone)]
pub struct PluginDescriptor {
    entry: String,
    factory: PluginFactory,
}

impl PluginDescriptor {
    /// Creates a descriptor. `entry` is the catalog key manifests refer to.
    pub fn new<F>(entry: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PluginContext) -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        Self {
            entry: entry.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Builds a fresh, uninitialized instance.
    pub fn instantiate(&self, context: &PluginContext) -> Arc<dyn Plugin> {
        (self.factory)(context)
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("entry", &self.entry)
            .field("factory", &"<fn>")
            .finish()
    }
}
