//! Notification events delivered to notification plugins.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    /// Informational.
    Info,
    /// An operation completed successfully.
    Success,
    /// Something needs attention.
    Warning,
    /// Something failed.
    Error,
}

impl NotificationLevel {
    /// All levels, in ascending severity.
    pub const ALL: [NotificationLevel; 4] = [Self::Info, Self::Success, Self::Warning, Self::Error];

    /// Return the level as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message to be delivered by notification plugins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Severity.
    pub level: NotificationLevel,
    /// Short title.
    pub title: String,
    /// Message body.
    pub message: String,
    /// Extra key/value fields rendered by the notifier.
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// When the event was raised.
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    /// Create a new event stamped with the current time.
    pub fn new(level: NotificationLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            fields: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach a field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
