//! Host services exposed to plugins.

pub mod context;
pub mod services;

pub use context::PluginContext;
