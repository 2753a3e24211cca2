//! Hook point definitions and the payload passed to subscribers.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle and domain event points plugins can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    // ── Lifecycle ──
    /// Fired to a plugin right after it is enabled.
    Startup,
    /// Fired to a plugin right before it is shut down.
    Shutdown,

    // ── Scanning ──
    /// Fired before a file is scanned.
    BeforeScan,
    /// Fired after a scan completes.
    AfterScan,

    // ── Indexing ──
    /// Fired before documents are written to the index.
    BeforeIndex,
    /// Fired after documents are indexed.
    AfterIndex,

    // ── Search ──
    /// Fired before a search query runs.
    BeforeSearch,
    /// Fired after a search query returns.
    AfterSearch,
}

impl Hook {
    /// Every hook, in lifecycle order.
    pub const ALL: [Hook; 8] = [
        Self::Startup,
        Self::Shutdown,
        Self::BeforeScan,
        Self::AfterScan,
        Self::BeforeIndex,
        Self::AfterIndex,
        Self::BeforeSearch,
        Self::AfterSearch,
    ];

    /// Returns the string name of this hook.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::BeforeScan => "before_scan",
            Self::AfterScan => "after_scan",
            Self::BeforeIndex => "before_index",
            Self::AfterIndex => "after_index",
            Self::BeforeSearch => "before_search",
            Self::AfterSearch => "after_search",
        }
    }

    /// Startup and shutdown are scoped to a single plugin.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Startup | Self::Shutdown)
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hook {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|h| h.as_str() == normalized)
            .ok_or_else(|| format!("unknown hook '{s}'"))
    }
}

/// Context map delivered to every subscriber of a hook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookPayload {
    /// Arbitrary data keyed by string.
    pub data: HashMap<String, Value>,
    /// When the hook was fired.
    pub timestamp: Option<DateTime<Utc>>,
}

impl HookPayload {
    /// Creates an empty payload stamped with the current time.
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Inserts a data value.
    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Inserts a string value.
    pub fn with_string(self, key: &str, value: &str) -> Self {
        self.with_data(key, value)
    }

    /// Inserts an integer value.
    pub fn with_int(self, key: &str, value: i64) -> Self {
        self.with_data(key, value)
    }

    /// Inserts a boolean value.
    pub fn with_bool(self, key: &str, value: bool) -> Self {
        self.with_data(key, value)
    }

    /// Gets a data value by key.
    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Gets a string data value.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Gets an i64 data value.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(|v| v.as_i64())
    }

    /// Gets a u64 data value.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(|v| v.as_u64())
    }

    /// Gets a bool data value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(|v| v.as_bool())
    }
}
