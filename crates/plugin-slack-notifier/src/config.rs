//! Notifier configuration, read from `plugins.settings.slack_notifier`.

use serde::{Deserialize, Serialize};

use docscope_core::types::NotificationLevel;
use docscope_plugin::metadata::{ConfigKind, ConfigOption, PluginConfigMap};
use docscope_plugin::{PluginError, PluginResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Incoming webhook URL.
    pub webhook_url: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_icon")]
    pub icon_emoji: String,
    /// Levels that are forwarded to Slack.
    #[serde(default = "default_levels")]
    pub levels: Vec<NotificationLevel>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_channel() -> String {
    "#general".to_string()
}

fn default_username() -> String {
    "DocScope".to_string()
}

fn default_icon() -> String {
    ":books:".to_string()
}

fn default_levels() -> Vec<NotificationLevel> {
    NotificationLevel::ALL.to_vec()
}

fn default_timeout_seconds() -> u64 {
    10
}

impl SlackConfig {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            channel: default_channel(),
            username: default_username(),
            icon_emoji: default_icon(),
            levels: default_levels(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    pub fn schema() -> Vec<ConfigOption> {
        vec![
            ConfigOption::required("webhook_url", ConfigKind::String)
                .describe("Slack webhook URL"),
            ConfigOption::optional("channel", ConfigKind::String, default_channel())
                .describe("Slack channel to post to"),
            ConfigOption::optional("username", ConfigKind::String, default_username())
                .describe("Bot username"),
            ConfigOption::optional("icon_emoji", ConfigKind::String, default_icon())
                .describe("Bot icon emoji"),
            ConfigOption::optional(
                "levels",
                ConfigKind::Array,
                NotificationLevel::ALL
                    .iter()
                    .map(|l| l.as_str())
                    .collect::<Vec<_>>(),
            )
            .describe("Notification levels forwarded to Slack"),
            ConfigOption::optional("timeout_seconds", ConfigKind::Integer, default_timeout_seconds())
                .describe("HTTP timeout for webhook calls"),
        ]
    }

    pub fn from_map(name: &str, map: &PluginConfigMap) -> PluginResult<Self> {
        let config: Self = serde_json::from_value(serde_json::Value::Object(map.clone()))
            .map_err(|e| PluginError::config(name, e.to_string()))?;
        let url = config.webhook_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(PluginError::config(
                name,
                "webhook_url must be an http(s) URL",
            ));
        }
        if config.timeout_seconds == 0 {
            return Err(PluginError::config(name, "timeout_seconds must be positive"));
        }
        Ok(config)
    }
}
