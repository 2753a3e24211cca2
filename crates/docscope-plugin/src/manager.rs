//! Plugin manager — the coordinator the host application talks to.
//!
//! The manager owns one [`PluginLoader`] and one [`PluginRegistry`] and
//! drives the lifecycle: discover → load → enable ⇄ disable → unload.
//! Construct it once and pass it around; nothing here is global.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::dependency;
use crate::error::{PluginError, PluginResult};
use crate::guard::{guarded, guarded_sync};
use crate::hooks::definitions::{Hook, HookPayload};
use crate::hooks::dispatcher::{DispatchMode, DispatchReport};
use crate::loader::{Discovery, LoadedPlugin, PluginLoader, PluginLocator};
use crate::metadata::{Capability, HealthState, PluginMetadata, PluginState};
use crate::registry::{PluginFilter, PluginRecord, PluginRegistry, RegistryStatus};
use crate::state::{PersistedPlugin, PersistedState, PluginStateStore};

/// Read-only view of a plugin for callers outside the plugin system.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub tags: Vec<String>,
    pub capabilities: Vec<Capability>,
    pub dependencies: Vec<String>,
    pub hooks: Vec<Hook>,
    pub commands: Vec<String>,
    pub state: PluginState,
    pub health: HealthState,
    pub loaded_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub source: Option<String>,
}

impl PluginInfo {
    fn from_record(record: &PluginRecord) -> Self {
        let meta = &record.metadata;
        let health = guarded_sync(&meta.name, "status", || record.instance.status())
            .unwrap_or_else(|e| HealthState::Unhealthy {
                reason: e.to_string(),
            });
        Self {
            name: meta.name.clone(),
            version: meta.version.to_string(),
            author: meta.author.clone(),
            description: meta.description.clone(),
            tags: meta.tags.clone(),
            capabilities: meta.capabilities.iter().copied().collect(),
            dependencies: meta.dependencies.iter().map(|d| d.to_string()).collect(),
            hooks: meta.hooks.clone(),
            commands: meta.commands.iter().map(|c| c.name.clone()).collect(),
            state: record.state,
            health,
            loaded_at: record.loaded_at,
            last_error: record.last_error.as_ref().map(|e| e.to_string()),
            source: record.source.as_ref().map(|s| s.to_string()),
        }
    }

    fn matches_query(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.description.to_lowercase().contains(query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(query))
    }
}

/// Coordinates discovery, loading and the plugin lifecycle.
#[derive(Debug)]
pub struct PluginManager {
    loader: Arc<PluginLoader>,
    registry: Arc<PluginRegistry>,
    state_store: Option<PluginStateStore>,
    fail_fast_hooks: bool,
    /// Suppresses state persistence during restore and teardown.
    persist_suspended: AtomicBool,
}

impl PluginManager {
    /// Creates a manager around `loader`, configured from its settings.
    pub fn new(loader: PluginLoader) -> Self {
        let config = loader.config().clone();
        Self {
            registry: Arc::new(PluginRegistry::from_config(&config)),
            state_store: config.state_file.clone().map(PluginStateStore::new),
            fail_fast_hooks: config.fail_fast_hooks,
            loader: Arc::new(loader),
            persist_suspended: AtomicBool::new(false),
        }
    }

    pub fn loader(&self) -> &Arc<PluginLoader> {
        &self.loader
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Candidates from the configured plugin directories and the catalog.
    pub fn discover(&self) -> Discovery {
        self.loader.discover()
    }

    async fn registered_metadata(&self) -> Vec<PluginMetadata> {
        self.registry
            .list_plugins(None)
            .await
            .into_iter()
            .map(|r| r.metadata)
            .collect()
    }

    /// Load, validate and register a plugin. Returns its name.
    ///
    /// Declared dependencies need not be present yet; they are enforced
    /// when the plugin is enabled. A dependency cycle through the new
    /// plugin is rejected here.
    pub async fn load_plugin(&self, locator: &PluginLocator) -> PluginResult<String> {
        let loaded = self.loader.load_plugin_from_file(locator)?;
        self.register_loaded(loaded).await
    }

    async fn register_loaded(&self, loaded: LoadedPlugin) -> PluginResult<String> {
        let name = loaded.metadata.name.clone();

        let _guard = self.registry.lock_lifecycle(&name).await;

        if self.registry.contains(&name).await {
            return Err(PluginError::AlreadyRegistered { name });
        }

        let registered = self.registered_metadata().await;
        let mut graph: Vec<&PluginMetadata> = registered.iter().collect();
        graph.push(&loaded.metadata);
        dependency::topological_order(&graph)?;

        self.loader.validate_plugin(&loaded)?;

        let LoadedPlugin {
            metadata,
            instance,
            locator,
            manifest_config,
        } = loaded;
        self.registry
            .register_with_source(metadata, instance, Some(locator))
            .await?;
        self.loader.commit_manifest_config(&name, manifest_config);

        info!(plugin = %name, "Plugin loaded");
        self.persist().await;
        Ok(name)
    }

    /// Load several plugins, ordering them by their dependencies first.
    ///
    /// Returns one result per locator.
    pub async fn load_all(
        &self,
        locators: &[PluginLocator],
    ) -> Vec<(PluginLocator, PluginResult<String>)> {
        let mut results = Vec::new();
        let mut batch: Vec<LoadedPlugin> = Vec::new();

        for locator in locators {
            match self.loader.load_plugin_from_file(locator) {
                Ok(loaded) => batch.push(loaded),
                Err(e) => {
                    warn!(locator = %locator, error = %e, "Skipping plugin");
                    results.push((locator.clone(), Err(e)));
                }
            }
        }

        let registered = self.registered_metadata().await;
        let plan = {
            let batch_meta: Vec<&PluginMetadata> = batch.iter().map(|l| &l.metadata).collect();
            let registered_meta: Vec<&PluginMetadata> = registered.iter().collect();
            self.loader.plan_load_order(&batch_meta, &registered_meta)
        };

        for (name, dependency) in &plan.missing {
            debug!(plugin = %name, dependency = %dependency, "Dependency not present yet; checked at enable");
        }

        for (name, err) in plan.excluded {
            if let Some(pos) = batch.iter().position(|l| l.metadata.name == name) {
                let loaded = batch.remove(pos);
                warn!(plugin = %name, error = %err, "Plugin excluded from load order");
                results.push((loaded.locator, Err(err)));
            }
        }

        for name in plan.order {
            if let Some(pos) = batch.iter().position(|l| l.metadata.name == name) {
                let loaded = batch.remove(pos);
                let locator = loaded.locator.clone();
                let result = self.register_loaded(loaded).await;
                if let Err(e) = &result {
                    warn!(locator = %locator, error = %e, "Plugin failed to load");
                }
                results.push((locator, result));
            }
        }

        // Same name twice in one batch: the planner saw it once.
        for loaded in batch {
            let name = loaded.metadata.name.clone();
            results.push((loaded.locator, Err(PluginError::AlreadyRegistered { name })));
        }

        results
    }

    /// Load every discovered candidate that is not registered yet.
    pub async fn load_discovered(&self) -> Vec<(PluginLocator, PluginResult<String>)> {
        let mut locators = Vec::new();
        for candidate in self.discover() {
            if let Some(name) = &candidate.name
                && self.registry.contains(name).await
            {
                continue;
            }
            locators.push(candidate.locator);
        }
        self.load_all(&locators).await
    }

    /// Initialize a LOADED or DISABLED plugin and start dispatching to it.
    ///
    /// Every declared dependency must already be ENABLED. If `initialize`
    /// fails the plugin moves to FAILED. Enabling an ENABLED plugin is a
    /// no-op.
    pub async fn enable_plugin(&self, name: &str) -> PluginResult<()> {
        let _guard = self.registry.lock_lifecycle(name).await;

        let record = self
            .registry
            .get_plugin(name)
            .await
            .ok_or_else(|| PluginError::NotFound {
                name: name.to_string(),
            })?;

        match record.state {
            PluginState::Enabled => {
                debug!(plugin = %name, "Plugin already enabled");
                return Ok(());
            }
            PluginState::Loaded | PluginState::Disabled => {}
            state => {
                return Err(PluginError::InvalidState {
                    name: name.to_string(),
                    state,
                    action: "enable",
                });
            }
        }

        self.registry.check_enabled_dependencies(name).await?;

        let config = match self.loader.resolve_config(&record.metadata) {
            Ok(config) => config,
            Err(e) => {
                self.registry.record_error(name, e.clone()).await;
                return Err(e);
            }
        };
        if let Err(e) = guarded_sync(name, "validate_config", || {
            record.instance.validate_config(&config)
        })
        .and_then(|result| result)
        {
            self.registry.record_error(name, e.clone()).await;
            return Err(e);
        }

        if let Err(e) = guarded(
            name,
            "initialize",
            self.registry.lifecycle_timeout(),
            record.instance.initialize(&config),
        )
        .await
        {
            error!(plugin = %name, error = %e, "Plugin initialization failed");
            self.registry.mark_failed(name, e.clone()).await?;
            self.persist().await;
            return Err(e);
        }

        if let Err(e) = self.registry.activate(name).await {
            // A dependency went away while we were initializing.
            warn!(plugin = %name, error = %e, "Rolling back plugin initialization");
            if let Err(shutdown_err) = guarded(
                name,
                "shutdown",
                self.registry.lifecycle_timeout(),
                record.instance.shutdown(),
            )
            .await
            {
                warn!(plugin = %name, error = %shutdown_err, "Rollback shutdown failed");
            }
            return Err(e);
        }

        let payload = HookPayload::new().with_string("plugin", name);
        self.registry.dispatch_to(name, Hook::Startup, &payload).await;

        info!(plugin = %name, version = %record.metadata.version, "Plugin enabled");
        self.persist().await;
        Ok(())
    }

    /// Shut an ENABLED plugin down and stop dispatching to it.
    ///
    /// Fails while another ENABLED plugin depends on it. If `shutdown`
    /// fails the plugin moves to FAILED. Disabling a DISABLED plugin is a
    /// no-op.
    pub async fn disable_plugin(&self, name: &str) -> PluginResult<()> {
        let _guard = self.registry.lock_lifecycle(name).await;

        let record = self
            .registry
            .get_plugin(name)
            .await
            .ok_or_else(|| PluginError::NotFound {
                name: name.to_string(),
            })?;
        if record.state == PluginState::Disabled {
            debug!(plugin = %name, "Plugin already disabled");
            return Ok(());
        }

        let instance = self.registry.deactivate(name).await?;

        let payload = HookPayload::new().with_string("plugin", name);
        self.registry
            .dispatch_to(name, Hook::Shutdown, &payload)
            .await;

        if let Err(e) = guarded(
            name,
            "shutdown",
            self.registry.lifecycle_timeout(),
            instance.shutdown(),
        )
        .await
        {
            error!(plugin = %name, error = %e, "Plugin shutdown failed");
            self.registry.mark_failed(name, e.clone()).await?;
            self.persist().await;
            return Err(e);
        }

        info!(plugin = %name, "Plugin disabled");
        self.persist().await;
        Ok(())
    }

    /// Remove a LOADED, DISABLED or FAILED plugin.
    pub async fn unload_plugin(&self, name: &str) -> PluginResult<()> {
        let _guard = self.registry.lock_lifecycle(name).await;

        self.registry.unregister(name).await?;
        self.loader.forget_manifest_config(name);
        info!(plugin = %name, "Plugin unloaded");
        self.persist().await;
        Ok(())
    }

    /// Unload and load again from the recorded locator, restoring the
    /// previous ENABLED state.
    pub async fn reload_plugin(&self, name: &str) -> PluginResult<()> {
        let record = self
            .registry
            .get_plugin(name)
            .await
            .ok_or_else(|| PluginError::NotFound {
                name: name.to_string(),
            })?;
        let locator = record
            .source
            .clone()
            .ok_or_else(|| PluginError::load(name, "plugin has no recorded source"))?;
        let was_enabled = record.is_enabled();

        if was_enabled {
            self.disable_plugin(name).await?;
        }
        self.unload_plugin(name).await?;
        let reloaded = self.load_plugin(&locator).await?;
        if was_enabled {
            self.enable_plugin(&reloaded).await?;
        }

        info!(plugin = %name, "Plugin reloaded");
        Ok(())
    }

    /// Plugins matching `filter`, in registration order.
    pub async fn list_plugins(&self, filter: Option<&PluginFilter>) -> Vec<PluginInfo> {
        self.registry
            .list_plugins(filter)
            .await
            .iter()
            .map(PluginInfo::from_record)
            .collect()
    }

    pub async fn get_plugin_info(&self, name: &str) -> PluginResult<PluginInfo> {
        self.registry
            .get_plugin(name)
            .await
            .map(|r| PluginInfo::from_record(&r))
            .ok_or_else(|| PluginError::NotFound {
                name: name.to_string(),
            })
    }

    /// Case-insensitive substring search over name, description and tags.
    pub async fn search_plugins(&self, query: &str, limit: Option<usize>) -> Vec<PluginInfo> {
        let query = query.trim().to_lowercase();
        self.list_plugins(None)
            .await
            .into_iter()
            .filter(|info| info.matches_query(&query))
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    pub async fn get_plugins_by_capability(&self, capability: Capability) -> Vec<PluginInfo> {
        self.registry
            .get_plugins_by_capability(capability)
            .await
            .iter()
            .map(PluginInfo::from_record)
            .collect()
    }

    /// Dispatch a hook using the configured failure semantics.
    pub async fn execute_hook(&self, hook: Hook, payload: &HookPayload) -> DispatchReport {
        let mode = if self.fail_fast_hooks {
            DispatchMode::FailFast
        } else {
            DispatchMode::BestEffort
        };
        self.registry.execute_hook_with(hook, payload, mode).await
    }

    pub async fn execute_hook_with(
        &self,
        hook: Hook,
        payload: &HookPayload,
        mode: DispatchMode,
    ) -> DispatchReport {
        self.registry.execute_hook_with(hook, payload, mode).await
    }

    pub async fn execute_command(&self, command: &str, args: Value) -> PluginResult<Value> {
        self.registry.execute_command(command, args).await
    }

    pub async fn status(&self) -> RegistryStatus {
        self.registry.status().await
    }

    /// Re-enable the plugins that were ENABLED when state was last saved.
    ///
    /// Each is loaded (if needed) and enabled in a dependency order
    /// computed now, not the order they were saved in. Returns one result
    /// per restored plugin.
    pub async fn restore_state(&self) -> PluginResult<Vec<(String, PluginResult<()>)>> {
        let Some(store) = &self.state_store else {
            return Ok(Vec::new());
        };
        let saved = store.load().await?;

        self.persist_suspended.store(true, Ordering::SeqCst);
        let results = self.restore_from(&saved).await;
        self.persist_suspended.store(false, Ordering::SeqCst);

        self.persist().await;
        Ok(results)
    }

    async fn restore_from(&self, saved: &PersistedState) -> Vec<(String, PluginResult<()>)> {
        let mut results = Vec::new();
        let mut names = Vec::new();

        for (name, locator) in saved.enabled() {
            if !self.registry.contains(name).await
                && let Err(e) = self.load_plugin(locator).await
            {
                warn!(plugin = %name, error = %e, "Could not restore plugin");
                results.push((name.to_string(), Err(e)));
                continue;
            }
            names.push(name.to_string());
        }

        let metadata: Vec<PluginMetadata> = self
            .registered_metadata()
            .await
            .into_iter()
            .filter(|m| names.contains(&m.name))
            .collect();
        let refs: Vec<&PluginMetadata> = metadata.iter().collect();
        let order = dependency::topological_order(&refs).unwrap_or(names);

        for name in order {
            let result = self.enable_plugin(&name).await;
            if let Err(e) = &result {
                warn!(plugin = %name, error = %e, "Could not re-enable plugin");
            }
            results.push((name, result));
        }

        info!(restored = results.iter().filter(|(_, r)| r.is_ok()).count(), "Plugin state restored");
        results
    }

    /// Disable every ENABLED plugin, dependents before dependencies.
    ///
    /// Persisted state keeps the pre-shutdown ENABLED set so the next
    /// start can restore it. Returns the failures; teardown continues past
    /// them.
    pub async fn shutdown(&self) -> Vec<(String, PluginError)> {
        self.persist_suspended.store(true, Ordering::SeqCst);

        let enabled: Vec<PluginMetadata> = self
            .registry
            .list_plugins(Some(&PluginFilter::default().with_state(PluginState::Enabled)))
            .await
            .into_iter()
            .map(|r| r.metadata)
            .collect();
        let refs: Vec<&PluginMetadata> = enabled.iter().collect();
        let mut order = dependency::topological_order(&refs)
            .unwrap_or_else(|_| enabled.iter().map(|m| m.name.clone()).collect());
        order.reverse();

        let mut failures = Vec::new();
        for name in order {
            if let Err(e) = self.disable_plugin(&name).await {
                error!(plugin = %name, error = %e, "Error disabling plugin during shutdown");
                failures.push((name, e));
            }
        }

        self.persist_suspended.store(false, Ordering::SeqCst);
        info!(failures = failures.len(), "Plugin system shut down");
        failures
    }

    async fn persist(&self) {
        let Some(store) = &self.state_store else {
            return;
        };
        if self.persist_suspended.load(Ordering::SeqCst) {
            return;
        }

        let mut state = PersistedState::default();
        for record in self.registry.list_plugins(None).await {
            if let Some(locator) = record.source {
                state.plugins.insert(
                    record.metadata.name,
                    PersistedPlugin {
                        state: record.state,
                        locator,
                    },
                );
            }
        }

        if let Err(e) = store.save(&state).await {
            warn!(error = %e, "Failed to persist plugin state");
        }
    }
}
