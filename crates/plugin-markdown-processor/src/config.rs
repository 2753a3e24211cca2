//! Processor configuration, read from `plugins.settings.markdown_processor`.

use serde::{Deserialize, Serialize};

use docscope_plugin::metadata::{ConfigKind, ConfigOption, PluginConfigMap};
use docscope_plugin::{PluginError, PluginResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub extract_toc: bool,
    pub extract_links: bool,
    pub extract_code_blocks: bool,
    pub add_reading_time: bool,
    /// Reading speed used for the reading-time estimate.
    pub words_per_minute: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            extract_toc: true,
            extract_links: true,
            extract_code_blocks: true,
            add_reading_time: true,
            words_per_minute: 225,
        }
    }
}

impl ProcessorConfig {
    pub fn schema() -> Vec<ConfigOption> {
        let d = Self::default();
        vec![
            ConfigOption::optional("extract_toc", ConfigKind::Bool, d.extract_toc)
                .describe("Extract table of contents from headers"),
            ConfigOption::optional("extract_links", ConfigKind::Bool, d.extract_links)
                .describe("Extract all links from document"),
            ConfigOption::optional("extract_code_blocks", ConfigKind::Bool, d.extract_code_blocks)
                .describe("Extract and categorize code blocks"),
            ConfigOption::optional("add_reading_time", ConfigKind::Bool, d.add_reading_time)
                .describe("Calculate estimated reading time"),
            ConfigOption::optional("words_per_minute", ConfigKind::Integer, d.words_per_minute)
                .describe("Reading speed for the estimate"),
        ]
    }

    pub fn from_map(name: &str, map: &PluginConfigMap) -> PluginResult<Self> {
        let config: Self = serde_json::from_value(serde_json::Value::Object(map.clone()))
            .map_err(|e| PluginError::config(name, e.to_string()))?;
        if config.words_per_minute == 0 {
            return Err(PluginError::config(name, "words_per_minute must be positive"));
        }
        Ok(config)
    }
}
