//! Persisted plugin state — a JSON name→state mapping.
//!
//! ```json
//! { "plugins": { "text_scanner": { "state": "enabled", "locator": "builtin:text_scanner" } } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{PluginError, PluginResult};
use crate::loader::PluginLocator;
use crate::metadata::PluginState;

/// One persisted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedPlugin {
    pub state: PluginState,
    pub locator: PluginLocator,
}

/// The whole persisted mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub plugins: BTreeMap<String, PersistedPlugin>,
}

impl PersistedState {
    /// Entries that were ENABLED when saved.
    pub fn enabled(&self) -> impl Iterator<Item = (&str, &PluginLocator)> {
        self.plugins
            .iter()
            .filter(|(_, p)| p.state == PluginState::Enabled)
            .map(|(name, p)| (name.as_str(), &p.locator))
    }
}

/// Reads and writes [`PersistedState`] at a fixed path.
#[derive(Debug)]
pub struct PluginStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PluginStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, reason: impl ToString) -> PluginError {
        PluginError::State {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Load the mapping. A missing file is an empty mapping.
    pub async fn load(&self) -> PluginResult<PersistedState> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| self.error(e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
            Err(e) => Err(self.error(e)),
        }
    }

    /// Replace the mapping on disk.
    pub async fn save(&self, state: &PersistedState) -> PluginResult<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error(e))?;
        }

        let body = serde_json::to_vec_pretty(state).map_err(|e| self.error(e))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(|e| self.error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.error(e))?;

        debug!(path = %self.path.display(), plugins = state.plugins.len(), "Plugin state saved");
        Ok(())
    }
}
