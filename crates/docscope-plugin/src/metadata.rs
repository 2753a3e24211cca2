//! Plugin metadata, capabilities, lifecycle states, and configuration schema.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PluginError, PluginResult};
use crate::hooks::definitions::Hook;

/// Configuration mapping handed to a plugin, keyed by option name.
pub type PluginConfigMap = Map<String, Value>;

/// Category of extension behavior a plugin may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Extracts documents from files.
    Scanner,
    /// Transforms or enriches documents.
    Processor,
    /// Provides a storage backend.
    Storage,
    /// Provides search functionality.
    Search,
    /// Exposes API endpoints.
    Api,
    /// Contributes UI components.
    Ui,
    /// Delivers notifications.
    Notification,
}

impl Capability {
    /// Every capability.
    pub const ALL: [Capability; 7] = [
        Self::Scanner,
        Self::Processor,
        Self::Storage,
        Self::Search,
        Self::Api,
        Self::Ui,
        Self::Notification,
    ];

    /// Returns the capability as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scanner => "scanner",
            Self::Processor => "processor",
            Self::Storage => "storage",
            Self::Search => "search",
            Self::Api => "api",
            Self::Ui => "ui",
            Self::Notification => "notification",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown capability '{s}'"))
    }
}

/// Lifecycle state of a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    /// Registered, not yet initialized.
    Loaded,
    /// Initialized and receiving hooks.
    Enabled,
    /// Shut down; may be re-enabled or unloaded.
    Disabled,
    /// `initialize` or `shutdown` failed; must be unloaded before reloading.
    Failed,
    /// Removed from the registry.
    Unloaded,
}

impl PluginState {
    /// Returns the state as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Failed => "failed",
            Self::Unloaded => "unloaded",
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "loaded" => Ok(Self::Loaded),
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            "failed" => Ok(Self::Failed),
            "unloaded" => Ok(Self::Unloaded),
            _ => Err(format!("unknown plugin state '{s}'")),
        }
    }
}

/// Self-reported plugin health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthState {
    /// `initialize` has not run yet.
    Uninitialized,
    /// Fully operational.
    Healthy,
    /// Operational with reduced functionality.
    Degraded { reason: String },
    /// Not operational.
    Unhealthy { reason: String },
    /// Shut down.
    Stopped,
}

impl HealthState {
    /// Whether the plugin can serve requests.
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded { .. })
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Healthy => f.write_str("healthy"),
            Self::Degraded { reason } => write!(f, "degraded ({reason})"),
            Self::Unhealthy { reason } => write!(f, "unhealthy ({reason})"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// A declared prerequisite on another plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Name of the required plugin.
    pub name: String,
    /// Accepted versions of the required plugin.
    pub version: VersionReq,
}

impl DependencySpec {
    /// Whether `version` satisfies this dependency.
    pub fn accepts(&self, version: &Version) -> bool {
        self.version.matches(version)
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version == VersionReq::STAR {
            f.write_str(&self.name)
        } else {
            write!(f, "{} {}", self.name, self.version)
        }
    }
}

/// A command exposed through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Globally unique command name.
    pub name: String,
    /// Short help text.
    pub description: String,
}

/// Expected JSON type of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    Bool,
    String,
    Integer,
    Float,
    Array,
    Object,
    Any,
}

impl ConfigKind {
    /// Whether `value` has this kind. Integers are accepted where floats are expected.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// One recognized configuration option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigOption {
    pub key: String,
    pub kind: ConfigKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: String,
}

impl ConfigOption {
    /// A mandatory option.
    pub fn required(key: impl Into<String>, kind: ConfigKind) -> Self {
        Self {
            key: key.into(),
            kind,
            required: true,
            default: None,
            description: String::new(),
        }
    }

    /// An optional option with a default value.
    pub fn optional(key: impl Into<String>, kind: ConfigKind, default: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            kind,
            required: false,
            default: Some(default.into()),
            description: String::new(),
        }
    }

    /// Attach help text.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The set of options a plugin recognizes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSchema {
    pub options: Vec<ConfigOption>,
}

impl ConfigSchema {
    /// Check required keys are present and present keys have the declared kind.
    ///
    /// Unknown keys are accepted.
    pub fn validate(&self, plugin: &str, config: &PluginConfigMap) -> PluginResult<()> {
        for option in &self.options {
            match config.get(&option.key) {
                None | Some(Value::Null) if option.required => {
                    return Err(PluginError::config(
                        plugin,
                        format!("missing required option '{}'", option.key),
                    ));
                }
                Some(value) if !value.is_null() && !option.kind.matches(value) => {
                    return Err(PluginError::config(
                        plugin,
                        format!("option '{}' must be of type {}", option.key, option.kind),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Fill absent keys from declared defaults.
    pub fn apply_defaults(&self, config: &mut PluginConfigMap) {
        for option in &self.options {
            if let Some(default) = &option.default {
                config
                    .entry(option.key.clone())
                    .or_insert_with(|| default.clone());
            }
        }
    }
}

/// Static description of a plugin, returned by [`crate::Plugin::metadata`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: Version,
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    /// Declared prerequisites, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    /// Hooks this plugin subscribes to.
    #[serde(default)]
    pub hooks: Vec<Hook>,
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
    #[serde(default)]
    pub config_schema: ConfigSchema,
}

impl PluginMetadata {
    /// Start building metadata for `name` at `version`.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            author: String::new(),
            description: String::new(),
            website: None,
            license: None,
            tags: Vec::new(),
            capabilities: BTreeSet::new(),
            dependencies: Vec::new(),
            hooks: Vec::new(),
            commands: Vec::new(),
            config_schema: ConfigSchema::default(),
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Declare a dependency with a version constraint.
    pub fn depends_on(mut self, name: impl Into<String>, version: VersionReq) -> Self {
        self.dependencies.push(DependencySpec {
            name: name.into(),
            version,
        });
        self
    }

    /// Declare a dependency on any version.
    pub fn requires(self, name: impl Into<String>) -> Self {
        self.depends_on(name, VersionReq::STAR)
    }

    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn command(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.commands.push(CommandSpec {
            name: name.into(),
            description: description.into(),
        });
        self
    }

    pub fn option(mut self, option: ConfigOption) -> Self {
        self.config_schema.options.push(option);
        self
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn subscribes_to(&self, hook: Hook) -> bool {
        self.hooks.contains(&hook)
    }

    pub fn depends_on_plugin(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d.name == name)
    }
}
