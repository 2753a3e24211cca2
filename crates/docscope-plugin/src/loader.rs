//! Plugin loader — discovery, instantiation, validation and config lookup.
//!
//! The loader never registers anything. It turns locators into validated
//! instances and leaves registration and activation to the manager.
//!
//! Plugin code reaches the host only through [`PluginDescriptor`]s
//! registered in the loader's catalog. A locator is either
//! `builtin:<entry>` or the path of a `plugin.json` manifest binding a
//! directory to a catalog entry:
//!
//! ```json
//! { "name": "slack_notifier", "entry": "slack_notifier",
//!   "config": { "channel": "#docs" } }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use docscope_core::config::plugin::PluginSystemConfig;

use crate::api::context::PluginContext;
use crate::contract::{Plugin, verify_contract};
use crate::dependency::{self, LoadPlan};
use crate::error::{PluginError, PluginResult};
use crate::exports::PluginDescriptor;
use crate::guard::guarded_sync;
use crate::metadata::{PluginConfigMap, PluginMetadata};

/// File name of a plugin manifest inside a plugin directory.
pub const MANIFEST_FILE: &str = "plugin.json";

const BUILTIN_PREFIX: &str = "builtin:";

/// Where a plugin comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PluginLocator {
    /// A catalog entry registered by the host.
    Builtin { entry: String },
    /// A `plugin.json` manifest on disk.
    Manifest { path: PathBuf },
}

impl PluginLocator {
    pub fn builtin(entry: impl Into<String>) -> Self {
        Self::Builtin {
            entry: entry.into(),
        }
    }

    pub fn manifest(path: impl Into<PathBuf>) -> Self {
        Self::Manifest { path: path.into() }
    }
}

impl fmt::Display for PluginLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin { entry } => write!(f, "{BUILTIN_PREFIX}{entry}"),
            Self::Manifest { path } => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for PluginLocator {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PluginError::load(s, "empty plugin locator"));
        }
        match s.strip_prefix(BUILTIN_PREFIX) {
            Some("") => Err(PluginError::load(s, "missing builtin entry name")),
            Some(entry) => Ok(Self::builtin(entry)),
            None => {
                let path = PathBuf::from(s);
                if path.is_dir() {
                    Ok(Self::manifest(path.join(MANIFEST_FILE)))
                } else {
                    Ok(Self::manifest(path))
                }
            }
        }
    }
}

impl From<PluginLocator> for String {
    fn from(locator: PluginLocator) -> Self {
        locator.to_string()
    }
}

impl TryFrom<String> for PluginLocator {
    type Error = PluginError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// On-disk plugin manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name; must match the instance metadata.
    pub name: String,
    /// Catalog entry implementing the plugin.
    pub entry: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Default configuration, overridden by host settings.
    #[serde(default)]
    pub config: PluginConfigMap,
}

impl PluginManifest {
    pub fn from_file(path: &Path) -> PluginResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PluginError::load(path.display(), format!("cannot read manifest: {e}")))?;
        let manifest: Self = serde_json::from_str(&raw)
            .map_err(|e| PluginError::load(path.display(), format!("malformed manifest: {e}")))?;
        if manifest.name.trim().is_empty() {
            return Err(PluginError::load(path.display(), "manifest name is empty"));
        }
        Ok(manifest)
    }
}

/// An unvalidated reference to a possible plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginCandidate {
    pub locator: PluginLocator,
    /// Name advertised by the source, if it could be read cheaply.
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Lazy, finite, restartable sequence of candidates.
///
/// Yields catalog entries first, then manifests from each search path in
/// order (plugin directories sorted by name). Directories are read only
/// as the iterator advances; clone it to restart from the same point.
#[derive(Debug, Clone)]
pub struct Discovery {
    builtins: std::vec::IntoIter<String>,
    search_paths: std::vec::IntoIter<PathBuf>,
    pending: std::vec::IntoIter<PathBuf>,
}

impl Discovery {
    fn new(builtins: Vec<String>, search_paths: Vec<PathBuf>) -> Self {
        Self {
            builtins: builtins.into_iter(),
            search_paths: search_paths.into_iter(),
            pending: Vec::new().into_iter(),
        }
    }

    fn manifests_in(dir: &Path) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %dir.display(), error = %e, "Skipping plugin search path");
                return Vec::new();
            }
        };
        let mut manifests: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path().join(MANIFEST_FILE))
            .filter(|manifest| manifest.is_file())
            .collect();
        manifests.sort();
        manifests
    }
}

impl Iterator for Discovery {
    type Item = PluginCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(entry) = self.builtins.next() {
            return Some(PluginCandidate {
                name: Some(entry.clone()),
                locator: PluginLocator::builtin(entry),
                description: None,
            });
        }
        loop {
            if let Some(path) = self.pending.next() {
                let manifest = PluginManifest::from_file(&path).ok();
                return Some(PluginCandidate {
                    name: manifest.as_ref().map(|m| m.name.clone()),
                    description: manifest.and_then(|m| m.description),
                    locator: PluginLocator::manifest(path),
                });
            }
            let dir = self.search_paths.next()?;
            self.pending = Self::manifests_in(&dir).into_iter();
        }
    }
}

/// A validated, instantiated, not-yet-registered plugin.
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    pub metadata: PluginMetadata,
    pub instance: Arc<dyn Plugin>,
    pub locator: PluginLocator,
    /// Manifest `config` table, committed to the loader only once the
    /// plugin is registered.
    pub manifest_config: Option<PluginConfigMap>,
}

/// Discovers and instantiates plugins from the descriptor catalog.
#[derive(Debug)]
pub struct PluginLoader {
    config: PluginSystemConfig,
    context: PluginContext,
    catalog: RwLock<Vec<PluginDescriptor>>,
    /// Manifest-provided default config, keyed by plugin name.
    manifest_defaults: RwLock<HashMap<String, PluginConfigMap>>,
}

impl PluginLoader {
    pub fn new(config: PluginSystemConfig, context: PluginContext) -> Self {
        Self {
            config,
            context,
            catalog: RwLock::new(Vec::new()),
            manifest_defaults: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &PluginSystemConfig {
        &self.config
    }

    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// Adds a descriptor to the catalog. Entry names are unique.
    pub fn register_descriptor(&self, descriptor: PluginDescriptor) -> PluginResult<()> {
        let mut catalog = self.catalog.write();
        if catalog.iter().any(|d| d.entry() == descriptor.entry()) {
            return Err(PluginError::load(
                PluginLocator::builtin(descriptor.entry()),
                "entry is already in the catalog",
            ));
        }
        debug!(entry = %descriptor.entry(), "Registered plugin descriptor");
        catalog.push(descriptor);
        Ok(())
    }

    /// Catalog entries in registration order.
    pub fn entries(&self) -> Vec<String> {
        self.catalog
            .read()
            .iter()
            .map(|d| d.entry().to_string())
            .collect()
    }

    fn descriptor(&self, entry: &str) -> Option<PluginDescriptor> {
        self.catalog
            .read()
            .iter()
            .find(|d| d.entry() == entry)
            .cloned()
    }

    /// Candidates from the catalog and the given search paths.
    pub fn discover_plugins(&self, search_paths: &[PathBuf]) -> Discovery {
        Discovery::new(self.entries(), search_paths.to_vec())
    }

    /// Candidates from the catalog and the configured directories.
    pub fn discover(&self) -> Discovery {
        self.discover_plugins(&self.config.directories)
    }

    /// Resolve a locator to a contract-checked instance.
    pub fn load_plugin_from_file(&self, locator: &PluginLocator) -> PluginResult<LoadedPlugin> {
        let (descriptor, manifest) = match locator {
            PluginLocator::Builtin { entry } => {
                let descriptor = self.descriptor(entry).ok_or_else(|| {
                    PluginError::load(locator, format!("no plugin entry named '{entry}'"))
                })?;
                (descriptor, None)
            }
            PluginLocator::Manifest { path } => {
                let manifest = PluginManifest::from_file(path)?;
                let descriptor = self.descriptor(&manifest.entry).ok_or_else(|| {
                    PluginError::load(
                        locator,
                        format!("manifest refers to unknown entry '{}'", manifest.entry),
                    )
                })?;
                (descriptor, Some(manifest))
            }
        };

        let entry = descriptor.entry().to_string();
        let instance = guarded_sync(&entry, "instantiate", || {
            descriptor.instantiate(&self.context)
        })
        .map_err(|e| PluginError::load(locator, e.to_string()))?;
        let metadata = guarded_sync(&entry, "metadata", || instance.metadata())
            .map_err(|e| PluginError::load(locator, e.to_string()))?;

        if let Some(manifest) = &manifest
            && manifest.name != metadata.name
        {
            return Err(PluginError::load(
                locator,
                format!(
                    "manifest name '{}' does not match plugin name '{}'",
                    manifest.name, metadata.name
                ),
            ));
        }

        verify_contract(&metadata, instance.as_ref())
            .map_err(|reason| PluginError::load(locator, reason))?;

        info!(
            plugin = %metadata.name,
            version = %metadata.version,
            locator = %locator,
            "Plugin instantiated"
        );

        Ok(LoadedPlugin {
            metadata,
            instance,
            locator: locator.clone(),
            manifest_config: manifest.map(|m| m.config),
        })
    }

    /// Record the manifest defaults of a registered plugin. `None` clears
    /// any defaults left by an earlier load under the same name.
    pub fn commit_manifest_config(&self, name: &str, config: Option<PluginConfigMap>) {
        let mut defaults = self.manifest_defaults.write();
        match config {
            Some(config) => {
                defaults.insert(name.to_string(), config);
            }
            None => {
                defaults.remove(name);
            }
        }
    }

    pub fn forget_manifest_config(&self, name: &str) {
        self.manifest_defaults.write().remove(name);
    }

    /// Raw configuration for `name`: manifest defaults overlaid with
    /// `plugins.settings.<name>` from the host configuration.
    pub fn load_plugin_config(&self, name: &str) -> PluginResult<PluginConfigMap> {
        let defaults = self
            .manifest_defaults
            .read()
            .get(name)
            .cloned()
            .unwrap_or_default();
        self.overlay_settings(name, defaults)
    }

    fn overlay_settings(&self, name: &str, mut config: PluginConfigMap) -> PluginResult<PluginConfigMap> {
        match self.config.settings.get(name) {
            None | Some(Value::Null) => {}
            Some(Value::Object(settings)) => {
                for (key, value) in settings {
                    config.insert(key.clone(), value.clone());
                }
            }
            Some(other) => {
                return Err(PluginError::config(
                    name,
                    format!("settings must be a table, found {other}"),
                ));
            }
        }
        Ok(config)
    }

    /// Configuration with schema defaults applied.
    pub fn resolve_config(&self, metadata: &PluginMetadata) -> PluginResult<PluginConfigMap> {
        let mut config = self.load_plugin_config(&metadata.name)?;
        metadata.config_schema.apply_defaults(&mut config);
        Ok(config)
    }

    /// Re-check the contract and dry-run the configuration the plugin would
    /// get once registered.
    pub fn validate_plugin(&self, loaded: &LoadedPlugin) -> PluginResult<()> {
        let LoadedPlugin {
            metadata,
            instance,
            manifest_config,
            ..
        } = loaded;
        verify_contract(metadata, &**instance)
            .map_err(|reason| PluginError::load(&metadata.name, reason))?;

        let mut config =
            self.overlay_settings(&metadata.name, manifest_config.clone().unwrap_or_default())?;
        metadata.config_schema.apply_defaults(&mut config);
        guarded_sync(&metadata.name, "validate_config", || {
            instance.validate_config(&config)
        })
        .and_then(|result| result)
        .inspect_err(|e| warn!(plugin = %metadata.name, error = %e, "Plugin configuration rejected"))
    }

    /// Dependency chain of `metadata` in load order, resolved against `known`.
    pub fn check_dependencies(
        &self,
        metadata: &PluginMetadata,
        known: &[&PluginMetadata],
    ) -> PluginResult<Vec<String>> {
        dependency::check_dependencies(metadata, known)
    }

    /// Load order for a batch, given what is already registered.
    pub fn plan_load_order(
        &self,
        batch: &[&PluginMetadata],
        registered: &[&PluginMetadata],
    ) -> LoadPlan {
        dependency::plan_load_order(batch, registered)
    }
}
