//! Plugin error taxonomy.
//!
//! Every failure that crosses the plugin boundary is expressed as a
//! [`PluginError`]. Callers that only care about the broad category can
//! match on [`PluginError::kind`].

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use docscope_core::error::{AppError, ErrorKind};

use crate::metadata::PluginState;

/// Result alias for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Broad error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginErrorKind {
    /// A plugin or command lookup missed.
    NotFound,
    /// The plugin source was malformed or violated the contract.
    Load,
    /// Plugin configuration failed validation.
    Config,
    /// A dependency was missing, disabled, mismatched, or cyclic.
    Dependency,
    /// A plugin operation failed while running.
    Runtime,
}

/// Errors raised by the plugin system and by plugins themselves.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    #[error("Plugin '{name}' not found")]
    NotFound { name: String },

    #[error("No plugin registered command '{command}'")]
    CommandNotFound { command: String },

    #[error("Failed to load plugin from {locator}: {reason}")]
    Load { locator: String, reason: String },

    #[error("Invalid configuration for plugin '{name}': {reason}")]
    Config { name: String, reason: String },

    #[error("Dependency error for plugin '{name}': {reason}")]
    Dependency { name: String, reason: String },

    #[error("Dependency cycle detected: {}", members.join(" -> "))]
    DependencyCycle { members: Vec<String> },

    #[error("Plugin '{name}' is already registered")]
    AlreadyRegistered { name: String },

    #[error("Command '{command}' is already registered by plugin '{owner}'")]
    CommandConflict { command: String, owner: String },

    #[error("Cannot {action} plugin '{name}' while it is {state}")]
    InvalidState {
        name: String,
        state: PluginState,
        action: &'static str,
    },

    #[error("Plugin '{name}' timed out during {operation} after {}ms", timeout.as_millis())]
    Timeout {
        name: String,
        operation: String,
        timeout: Duration,
    },

    #[error("Plugin '{name}' panicked during {operation}: {message}")]
    Panicked {
        name: String,
        operation: String,
        message: String,
    },

    #[error("Plugin '{name}' failed: {message}")]
    Runtime { name: String, message: String },

    #[error("Failed to persist plugin state at {path}: {reason}")]
    State { path: String, reason: String },
}

impl PluginError {
    /// Runtime failure raised by a plugin.
    pub fn runtime(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Runtime {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Configuration rejected by a plugin.
    pub fn config(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Malformed plugin source.
    pub fn load(locator: impl ToString, reason: impl Into<String>) -> Self {
        Self::Load {
            locator: locator.to_string(),
            reason: reason.into(),
        }
    }

    /// Unsatisfied dependency.
    pub fn dependency(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Dependency {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns the broad category of this error.
    pub fn kind(&self) -> PluginErrorKind {
        match self {
            Self::NotFound { .. } | Self::CommandNotFound { .. } => PluginErrorKind::NotFound,
            Self::Load { .. } | Self::AlreadyRegistered { .. } | Self::CommandConflict { .. } => {
                PluginErrorKind::Load
            }
            Self::Config { .. } => PluginErrorKind::Config,
            Self::Dependency { .. } | Self::DependencyCycle { .. } => PluginErrorKind::Dependency,
            Self::InvalidState { .. }
            | Self::Timeout { .. }
            | Self::Panicked { .. }
            | Self::Runtime { .. }
            | Self::State { .. } => PluginErrorKind::Runtime,
        }
    }

    /// Whether this is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        self.kind() == PluginErrorKind::NotFound
    }

    /// Whether this is a dependency failure.
    pub fn is_dependency(&self) -> bool {
        self.kind() == PluginErrorKind::Dependency
    }

    /// Whether the plugin exceeded its time budget.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<PluginError> for AppError {
    fn from(err: PluginError) -> Self {
        let kind = match &err {
            PluginError::NotFound { .. } | PluginError::CommandNotFound { .. } => {
                ErrorKind::NotFound
            }
            PluginError::Config { .. } => ErrorKind::Configuration,
            PluginError::AlreadyRegistered { .. } | PluginError::CommandConflict { .. } => {
                ErrorKind::Conflict
            }
            PluginError::InvalidState { .. } => ErrorKind::Validation,
            PluginError::Timeout { .. } => ErrorKind::Timeout,
            PluginError::State { .. } => ErrorKind::Storage,
            _ => ErrorKind::Plugin,
        };
        AppError::with_source(kind, err.to_string(), err)
    }
}
