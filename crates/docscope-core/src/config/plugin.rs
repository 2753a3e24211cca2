//! Plugin system configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Plugin system configuration (the `[plugins]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSystemConfig {
    /// Directories searched for `plugin.json` manifests, in order.
    #[serde(default = "default_directories")]
    pub directories: Vec<PathBuf>,
    /// Whether to load every discovered plugin on startup.
    #[serde(default = "default_true")]
    pub auto_load: bool,
    /// Plugin names (or locators) to enable on startup.
    #[serde(default)]
    pub enabled: Vec<String>,
    /// Where the name→state mapping is persisted. `None` disables persistence.
    #[serde(default = "default_state_file")]
    pub state_file: Option<PathBuf>,
    /// Per-plugin timeout applied to each hook handler.
    #[serde(default = "default_timeout_seconds")]
    pub hook_timeout_seconds: u64,
    /// Timeout applied to `initialize`, `shutdown` and commands.
    #[serde(default = "default_timeout_seconds")]
    pub lifecycle_timeout_seconds: u64,
    /// Hook timeout overrides keyed by plugin name, in milliseconds.
    #[serde(default)]
    pub timeout_overrides_ms: HashMap<String, u64>,
    /// Stop hook dispatch at the first failing plugin.
    #[serde(default)]
    pub fail_fast_hooks: bool,
    /// Plugin-specific settings tables keyed by plugin name.
    #[serde(default)]
    pub settings: HashMap<String, Value>,
}

impl PluginSystemConfig {
    /// Default per-plugin hook timeout.
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_seconds)
    }

    /// Timeout for lifecycle calls and commands.
    pub fn lifecycle_timeout(&self) -> Duration {
        Duration::from_secs(self.lifecycle_timeout_seconds)
    }

    /// Hook timeout for a specific plugin, honoring overrides.
    pub fn hook_timeout_for(&self, plugin: &str) -> Duration {
        self.timeout_overrides_ms
            .get(plugin)
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or_else(|| self.hook_timeout())
    }
}

impl Default for PluginSystemConfig {
    fn default() -> Self {
        Self {
            directories: default_directories(),
            auto_load: true,
            enabled: Vec::new(),
            state_file: default_state_file(),
            hook_timeout_seconds: default_timeout_seconds(),
            lifecycle_timeout_seconds: default_timeout_seconds(),
            timeout_overrides_ms: HashMap::new(),
            fail_fast_hooks: false,
            settings: HashMap::new(),
        }
    }
}

fn default_directories() -> Vec<PathBuf> {
    vec![PathBuf::from("./plugins")]
}

fn default_state_file() -> Option<PathBuf> {
    Some(PathBuf::from("data/plugin_state.json"))
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_true() -> bool {
    true
}
