//! # docscope-plugin
//!
//! Plugin framework for DocScope. Provides:
//!
//! - The plugin contract and its capability traits (scanner, processor,
//!   notification)
//! - Discovery and loading from the descriptor catalog and `plugin.json`
//!   manifests
//! - Dependency ordering and cycle detection
//! - A registry with hook dispatch and command routing
//! - The lifecycle manager the host talks to, with persisted state
//! - Host context handed to plugins (document sink, search index, metrics)

pub mod api;
pub mod contract;
pub mod dependency;
pub mod error;
pub mod exports;
pub mod guard;
pub mod hooks;
pub mod loader;
pub mod macros;
pub mod manager;
pub mod metadata;
pub mod pipeline;
pub mod prelude;
pub mod registry;
pub mod state;

pub use api::PluginContext;
pub use contract::{NotificationPlugin, Plugin, ProcessorPlugin, ScannerPlugin};
pub use error::{PluginError, PluginResult};
pub use exports::PluginDescriptor;
pub use hooks::{DispatchMode, DispatchReport, Hook, HookDispatcher, HookPayload};
pub use loader::{PluginCandidate, PluginLoader, PluginLocator};
pub use manager::{PluginInfo, PluginManager};
pub use metadata::{Capability, HealthState, PluginMetadata, PluginState};
pub use registry::{PluginFilter, PluginRegistry};
