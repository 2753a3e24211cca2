//! Slack notifier plugin implementation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use semver::Version;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use docscope_core::types::{NotificationEvent, NotificationLevel};
use docscope_plugin::prelude::*;

use crate::ENTRY;
use crate::config::SlackConfig;
use crate::message;

/// Command that posts a test message.
pub const TEST_COMMAND: &str = "slack.test";

#[derive(Debug, Clone)]
struct Connection {
    config: SlackConfig,
    client: reqwest::Client,
}

/// Sends notifications to a Slack incoming webhook.
#[derive(Debug)]
pub struct SlackNotifierPlugin {
    connection: RwLock<Option<Connection>>,
    health: RwLock<HealthState>,
    stopped: AtomicBool,
    sent: AtomicU64,
}

impl SlackNotifierPlugin {
    pub fn new() -> Self {
        Self {
            connection: RwLock::new(None),
            health: RwLock::new(HealthState::Uninitialized),
            stopped: AtomicBool::new(false),
            sent: AtomicU64::new(0),
        }
    }

    /// Messages delivered since initialization.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn connection(&self) -> PluginResult<Connection> {
        self.connection
            .read()
            .clone()
            .ok_or_else(|| PluginError::runtime(ENTRY, "webhook is not configured"))
    }

    async fn post(&self, event: &NotificationEvent) -> PluginResult<()> {
        let connection = self.connection()?;
        let body = message::webhook_body(&connection.config, event);

        let response = connection
            .client
            .post(&connection.config.webhook_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                *self.health.write() = HealthState::Degraded {
                    reason: e.to_string(),
                };
                PluginError::runtime(ENTRY, format!("webhook request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = %status, detail = %detail, "Slack rejected notification");
            *self.health.write() = HealthState::Degraded {
                reason: format!("webhook returned {status}"),
            };
            return Err(PluginError::runtime(
                ENTRY,
                format!("webhook returned {status}: {detail}"),
            ));
        }

        *self.health.write() = HealthState::Healthy;
        self.sent.fetch_add(1, Ordering::Relaxed);
        debug!(level = %event.level, title = %event.title, "Sent Slack notification");
        Ok(())
    }

    async fn deliver_if_wanted(&self, event: NotificationEvent) -> PluginResult<Option<Value>> {
        if !self.notification_levels().contains(&event.level) {
            return Ok(Some(json!({ "sent": false })));
        }
        self.post(&event).await?;
        Ok(Some(json!({ "sent": true })))
    }
}

impl Default for SlackNotifierPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for SlackNotifierPlugin {
    fn metadata(&self) -> PluginMetadata {
        let mut meta = PluginMetadata::new(ENTRY, Version::new(1, 0, 0))
            .author("DocScope Team")
            .description("Send notifications to Slack channels")
            .website("https://github.com/docscope/slack-notifier")
            .license("MIT")
            .tag("slack")
            .tag("notification")
            .tag("webhook")
            .capability(Capability::Notification)
            .hook(Hook::AfterScan)
            .hook(Hook::AfterIndex)
            .command(TEST_COMMAND, "Post a test message to the configured channel");
        for option in SlackConfig::schema() {
            meta = meta.option(option);
        }
        meta
    }

    fn validate_config(&self, config: &PluginConfigMap) -> PluginResult<()> {
        self.metadata().config_schema.validate(ENTRY, config)?;
        SlackConfig::from_map(ENTRY, config).map(|_| ())
    }

    async fn initialize(&self, config: &PluginConfigMap) -> PluginResult<()> {
        let config = SlackConfig::from_map(ENTRY, config)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PluginError::runtime(ENTRY, format!("HTTP client: {e}")))?;

        info!(channel = %config.channel, "Slack notifier initialized");
        *self.connection.write() = Some(Connection { config, client });
        *self.health.write() = HealthState::Healthy;
        self.stopped.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> PluginResult<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.connection.write().take();
        *self.health.write() = HealthState::Stopped;
        info!(sent = self.sent_count(), "Slack notifier shut down");
        Ok(())
    }

    fn status(&self) -> HealthState {
        self.health.read().clone()
    }

    async fn on_hook(&self, hook: Hook, payload: &HookPayload) -> PluginResult<Option<Value>> {
        match hook {
            Hook::AfterScan => self.deliver_if_wanted(message::scan_completed(payload)).await,
            Hook::AfterIndex => self.deliver_if_wanted(message::index_completed(payload)).await,
            _ => Ok(None),
        }
    }

    async fn execute_command(&self, command: &str, args: Value) -> PluginResult<Value> {
        if command != TEST_COMMAND {
            return Err(PluginError::CommandNotFound {
                command: command.to_string(),
            });
        }
        let text = args
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("DocScope Slack integration is working");
        let event = NotificationEvent::new(NotificationLevel::Info, "Test notification", text);
        self.post(&event).await?;
        Ok(json!({ "sent": true, "channel": self.connection()?.config.channel }))
    }

    fn as_notifier(&self) -> Option<&dyn NotificationPlugin> {
        Some(self)
    }
}

#[async_trait]
impl NotificationPlugin for SlackNotifierPlugin {
    async fn send_notification(&self, event: &NotificationEvent) -> PluginResult<()> {
        self.post(event).await
    }

    fn notification_levels(&self) -> Vec<NotificationLevel> {
        self.connection
            .read()
            .as_ref()
            .map(|c| c.config.levels.clone())
            .unwrap_or_else(|| NotificationLevel::ALL.to_vec())
    }
}
