//! Prelude for plugin crates.

pub use async_trait::async_trait;

pub use crate::api::PluginContext;
pub use crate::contract::{NotificationPlugin, Plugin, ProcessorPlugin, ScannerPlugin};
pub use crate::error::{PluginError, PluginResult};
pub use crate::exports::PluginDescriptor;
pub use crate::hooks::{Hook, HookPayload};
pub use crate::metadata::{
    Capability, ConfigKind, ConfigOption, HealthState, PluginConfigMap, PluginMetadata,
};

pub use crate::hook_payload;
