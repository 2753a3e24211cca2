//! Scanner configuration, read from `plugins.settings.text_scanner`.

use serde::{Deserialize, Serialize};

use docscope_plugin::metadata::{ConfigKind, ConfigOption, PluginConfigMap};
use docscope_plugin::{PluginError, PluginResult};

/// Configuration for the text scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Accepted file extensions, with or without the leading dot.
    pub extensions: Vec<String>,
    /// Files larger than this are rejected.
    pub max_file_size_bytes: u64,
    /// Derive the title from the first heading and attach text statistics.
    pub extract_metadata: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            max_file_size_bytes: 10 * 1024 * 1024,
            extract_metadata: true,
        }
    }
}

fn default_extensions() -> Vec<String> {
    [".txt", ".md", ".markdown", ".rst", ".log"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl ScannerConfig {
    /// Options advertised in the plugin's config schema.
    pub fn schema() -> Vec<ConfigOption> {
        let defaults = Self::default();
        vec![
            ConfigOption::optional("extensions", ConfigKind::Array, defaults.extensions)
                .describe("File extensions the scanner accepts"),
            ConfigOption::optional(
                "max_file_size_bytes",
                ConfigKind::Integer,
                defaults.max_file_size_bytes,
            )
            .describe("Largest file the scanner will read"),
            ConfigOption::optional("extract_metadata", ConfigKind::Bool, defaults.extract_metadata)
                .describe("Attach title and text statistics"),
        ]
    }

    /// Parse a resolved config map.
    pub fn from_map(name: &str, map: &PluginConfigMap) -> PluginResult<Self> {
        let config: Self = serde_json::from_value(serde_json::Value::Object(map.clone()))
            .map_err(|e| PluginError::config(name, e.to_string()))?;
        if config.extensions.is_empty() {
            return Err(PluginError::config(name, "extensions must not be empty"));
        }
        if config.max_file_size_bytes == 0 {
            return Err(PluginError::config(name, "max_file_size_bytes must be positive"));
        }
        Ok(config)
    }

    /// Whether `extension` (without the dot) is accepted, ignoring case.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}
