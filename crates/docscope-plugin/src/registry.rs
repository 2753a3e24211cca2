//! Plugin registry — the authoritative table of plugin records.
//!
//! Structural mutations take the table write lock for the duration of a
//! single check-and-update. Plugin code is never called while the lock is
//! held: dispatch snapshots the matching records, releases the lock, then
//! calls into the plugins.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use docscope_core::config::plugin::PluginSystemConfig;

use crate::contract::Plugin;
use crate::error::{PluginError, PluginResult};
use crate::guard::guarded;
use crate::hooks::definitions::{Hook, HookPayload};
use crate::hooks::dispatcher::{DispatchMode, DispatchReport, HookDispatcher, HookInvocation};
use crate::loader::PluginLocator;
use crate::metadata::{Capability, PluginMetadata, PluginState};

/// Bookkeeping for one registered plugin.
#[derive(Debug, Clone)]
pub struct PluginRecord {
    /// Metadata captured at registration.
    pub metadata: PluginMetadata,
    /// The live instance.
    pub instance: Arc<dyn Plugin>,
    /// Current lifecycle state.
    pub state: PluginState,
    /// When the plugin was registered.
    pub loaded_at: DateTime<Utc>,
    /// Most recent failure recorded against this plugin.
    pub last_error: Option<PluginError>,
    /// Registration order.
    pub sequence: u64,
    /// Where the plugin was loaded from, if known.
    pub source: Option<PluginLocator>,
}

impl PluginRecord {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn is_enabled(&self) -> bool {
        self.state == PluginState::Enabled
    }
}

/// Optional criteria for [`PluginRegistry::list_plugins`].
#[derive(Debug, Clone, Default)]
pub struct PluginFilter {
    pub state: Option<PluginState>,
    pub capability: Option<Capability>,
    pub hook: Option<Hook>,
}

impl PluginFilter {
    pub fn with_state(mut self, state: PluginState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn matches(&self, record: &PluginRecord) -> bool {
        self.state.is_none_or(|s| record.state == s)
            && self
                .capability
                .is_none_or(|c| record.metadata.has_capability(c))
            && self.hook.is_none_or(|h| record.metadata.subscribes_to(h))
    }
}

/// Registry totals.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStatus {
    pub total: usize,
    pub by_state: BTreeMap<PluginState, usize>,
    pub by_capability: BTreeMap<Capability, usize>,
    pub commands: usize,
}

#[derive(Debug, Default)]
struct RegistryTable {
    records: HashMap<String, PluginRecord>,
    /// Command name → owning plugin.
    commands: HashMap<String, String>,
}

impl RegistryTable {
    fn record(&self, name: &str) -> PluginResult<&PluginRecord> {
        self.records.get(name).ok_or_else(|| PluginError::NotFound {
            name: name.to_string(),
        })
    }

    fn record_mut(&mut self, name: &str) -> PluginResult<&mut PluginRecord> {
        self.records.get_mut(name).ok_or_else(|| PluginError::NotFound {
            name: name.to_string(),
        })
    }

    fn enabled_dependents(&self, name: &str) -> Vec<String> {
        let mut dependents: Vec<&PluginRecord> = self
            .records
            .values()
            .filter(|r| r.is_enabled() && r.metadata.depends_on_plugin(name))
            .collect();
        dependents.sort_by_key(|r| r.sequence);
        dependents.iter().map(|r| r.metadata.name.clone()).collect()
    }

    fn sorted(&self) -> Vec<&PluginRecord> {
        let mut records: Vec<&PluginRecord> = self.records.values().collect();
        records.sort_by_key(|r| r.sequence);
        records
    }

    /// Every declared dependency of `metadata` is registered, ENABLED and
    /// version-compatible.
    fn check_enabled_dependencies(&self, metadata: &PluginMetadata) -> PluginResult<()> {
        for dep in &metadata.dependencies {
            let Some(record) = self.records.get(&dep.name) else {
                return Err(PluginError::dependency(
                    &metadata.name,
                    format!("dependency '{}' is not loaded", dep.name),
                ));
            };
            if !record.is_enabled() {
                return Err(PluginError::dependency(
                    &metadata.name,
                    format!("dependency '{}' is not enabled (state: {})", dep.name, record.state),
                ));
            }
            if !dep.accepts(&record.metadata.version) {
                return Err(PluginError::dependency(
                    &metadata.name,
                    format!(
                        "requires '{}' {} but version {} is loaded",
                        dep.name, dep.version, record.metadata.version
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Held for the duration of one lifecycle transition.
#[derive(Debug)]
pub struct LifecycleGuard<'a> {
    registry: &'a PluginRegistry,
    name: String,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for LifecycleGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.registry.prune_lifecycle_lock(&self.name);
    }
}

/// Registry of all loaded plugins.
#[derive(Debug)]
pub struct PluginRegistry {
    table: RwLock<RegistryTable>,
    sequence: AtomicU64,
    lifecycle_locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    dispatcher: HookDispatcher,
    lifecycle_timeout: Duration,
}

impl PluginRegistry {
    /// Creates an empty registry with default timeouts.
    pub fn new() -> Self {
        Self::with_dispatcher(HookDispatcher::default(), Duration::from_secs(30))
    }

    /// Creates an empty registry with the given dispatcher and lifecycle timeout.
    pub fn with_dispatcher(dispatcher: HookDispatcher, lifecycle_timeout: Duration) -> Self {
        Self {
            table: RwLock::new(RegistryTable::default()),
            sequence: AtomicU64::new(0),
            lifecycle_locks: parking_lot::Mutex::new(HashMap::new()),
            dispatcher,
            lifecycle_timeout,
        }
    }

    /// Creates an empty registry configured from the `[plugins]` section.
    pub fn from_config(config: &PluginSystemConfig) -> Self {
        Self::with_dispatcher(
            HookDispatcher::from_config(config),
            config.lifecycle_timeout(),
        )
    }

    pub fn dispatcher(&self) -> &HookDispatcher {
        &self.dispatcher
    }

    /// Timeout applied to initialize, shutdown and commands.
    pub fn lifecycle_timeout(&self) -> Duration {
        self.lifecycle_timeout
    }

    /// Take the per-name lock serializing structural transitions of one
    /// plugin. The lock entry is dropped once nobody holds or awaits it.
    pub async fn lock_lifecycle(&self, name: &str) -> LifecycleGuard<'_> {
        let lock = self
            .lifecycle_locks
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone();
        LifecycleGuard {
            registry: self,
            name: name.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    fn prune_lifecycle_lock(&self, name: &str) {
        let mut locks = self.lifecycle_locks.lock();
        if locks
            .get(name)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(name);
        }
    }

    #[cfg(test)]
    fn lifecycle_lock_count(&self) -> usize {
        self.lifecycle_locks.lock().len()
    }

    /// Registers a plugin in state LOADED.
    pub async fn register(
        &self,
        metadata: PluginMetadata,
        instance: Arc<dyn Plugin>,
    ) -> PluginResult<()> {
        self.register_with_source(metadata, instance, None).await
    }

    /// Registers a plugin and remembers where it came from.
    ///
    /// Fails without side effects if the name is taken or any declared
    /// command is already owned by another plugin.
    pub async fn register_with_source(
        &self,
        metadata: PluginMetadata,
        instance: Arc<dyn Plugin>,
        source: Option<PluginLocator>,
    ) -> PluginResult<()> {
        let mut table = self.table.write().await;
        let name = metadata.name.clone();

        if table.records.contains_key(&name) {
            return Err(PluginError::AlreadyRegistered { name });
        }
        for command in &metadata.commands {
            if let Some(owner) = table.commands.get(&command.name) {
                return Err(PluginError::CommandConflict {
                    command: command.name.clone(),
                    owner: owner.clone(),
                });
            }
        }

        for command in &metadata.commands {
            table.commands.insert(command.name.clone(), name.clone());
        }

        info!(
            plugin = %name,
            version = %metadata.version,
            capabilities = metadata.capabilities.len(),
            hooks = metadata.hooks.len(),
            "Registering plugin"
        );

        let record = PluginRecord {
            metadata,
            instance,
            state: PluginState::Loaded,
            loaded_at: Utc::now(),
            last_error: None,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            source,
        };
        table.records.insert(name, record);
        Ok(())
    }

    /// Removes a plugin and shuts its instance down.
    ///
    /// Valid from LOADED, DISABLED or FAILED, and only when no ENABLED
    /// plugin depends on it. A failing `shutdown` is logged; the record is
    /// removed regardless.
    pub async fn unregister(&self, name: &str) -> PluginResult<()> {
        let record = {
            let mut table = self.table.write().await;
            let record = table.record(name)?;
            if record.is_enabled() {
                return Err(PluginError::InvalidState {
                    name: name.to_string(),
                    state: record.state,
                    action: "unload",
                });
            }
            let dependents = table.enabled_dependents(name);
            if !dependents.is_empty() {
                return Err(PluginError::dependency(
                    name,
                    format!("required by enabled plugin(s): {}", dependents.join(", ")),
                ));
            }
            let record = table.records.remove(name).ok_or_else(|| PluginError::NotFound {
                name: name.to_string(),
            })?;
            table.commands.retain(|_, owner| owner != name);
            record
        };

        if let Err(e) = guarded(
            name,
            "shutdown",
            self.lifecycle_timeout,
            record.instance.shutdown(),
        )
        .await
        {
            warn!(plugin = %name, error = %e, "Plugin shutdown returned error during unload");
        }

        info!(plugin = %name, "Plugin unregistered");
        Ok(())
    }

    /// Returns a snapshot of a plugin's record.
    pub async fn get_plugin(&self, name: &str) -> Option<PluginRecord> {
        self.table.read().await.records.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.table.read().await.records.contains_key(name)
    }

    /// Records matching `filter`, in registration order.
    pub async fn list_plugins(&self, filter: Option<&PluginFilter>) -> Vec<PluginRecord> {
        let table = self.table.read().await;
        table
            .sorted()
            .into_iter()
            .filter(|r| filter.is_none_or(|f| f.matches(r)))
            .cloned()
            .collect()
    }

    /// Records declaring `capability`, in registration order.
    pub async fn get_plugins_by_capability(&self, capability: Capability) -> Vec<PluginRecord> {
        self.list_plugins(Some(&PluginFilter::default().with_capability(capability)))
            .await
    }

    /// ENABLED plugins declaring `capability`, as `(name, instance)` pairs.
    pub async fn enabled_with_capability(
        &self,
        capability: Capability,
    ) -> Vec<(String, Arc<dyn Plugin>)> {
        let table = self.table.read().await;
        table
            .sorted()
            .into_iter()
            .filter(|r| r.is_enabled() && r.metadata.has_capability(capability))
            .map(|r| (r.metadata.name.clone(), r.instance.clone()))
            .collect()
    }

    /// Names of ENABLED plugins that declare a dependency on `name`.
    pub async fn enabled_dependents(&self, name: &str) -> Vec<String> {
        self.table.read().await.enabled_dependents(name)
    }

    /// Fails unless every dependency of `name` is registered and ENABLED.
    pub async fn check_enabled_dependencies(&self, name: &str) -> PluginResult<()> {
        let table = self.table.read().await;
        let record = table.record(name)?;
        table.check_enabled_dependencies(&record.metadata)
    }

    /// LOADED/DISABLED → ENABLED, re-checking dependencies atomically.
    pub async fn activate(&self, name: &str) -> PluginResult<()> {
        let mut table = self.table.write().await;
        let record = table.record(name)?;
        if !matches!(record.state, PluginState::Loaded | PluginState::Disabled) {
            return Err(PluginError::InvalidState {
                name: name.to_string(),
                state: record.state,
                action: "enable",
            });
        }
        let metadata = record.metadata.clone();
        table.check_enabled_dependencies(&metadata)?;

        let record = table.record_mut(name)?;
        record.state = PluginState::Enabled;
        record.last_error = None;
        Ok(())
    }

    /// ENABLED → DISABLED, provided no ENABLED plugin depends on `name`.
    ///
    /// Returns the instance so the caller can shut it down.
    pub async fn deactivate(&self, name: &str) -> PluginResult<Arc<dyn Plugin>> {
        let mut table = self.table.write().await;
        let record = table.record(name)?;
        if !record.is_enabled() {
            return Err(PluginError::InvalidState {
                name: name.to_string(),
                state: record.state,
                action: "disable",
            });
        }
        let dependents = table.enabled_dependents(name);
        if !dependents.is_empty() {
            return Err(PluginError::dependency(
                name,
                format!("required by enabled plugin(s): {}", dependents.join(", ")),
            ));
        }

        let record = table.record_mut(name)?;
        record.state = PluginState::Disabled;
        Ok(record.instance.clone())
    }

    /// Moves a plugin to FAILED and records the cause.
    pub async fn mark_failed(&self, name: &str, error: PluginError) -> PluginResult<()> {
        let mut table = self.table.write().await;
        let record = table.record_mut(name)?;
        warn!(plugin = %name, previous = %record.state, error = %error, "Plugin failed");
        record.state = PluginState::Failed;
        record.last_error = Some(error);
        Ok(())
    }

    /// Records an error without changing state.
    pub async fn record_error(&self, name: &str, error: PluginError) {
        let mut table = self.table.write().await;
        if let Some(record) = table.records.get_mut(name) {
            record.last_error = Some(error);
        }
    }

    /// Dispatch a hook to every ENABLED subscriber in registration order.
    ///
    /// Failures are collected per plugin; every subscriber is called.
    pub async fn execute_hook(&self, hook: Hook, payload: &HookPayload) -> DispatchReport {
        self.execute_hook_with(hook, payload, DispatchMode::BestEffort)
            .await
    }

    /// Dispatch a hook with explicit failure semantics.
    pub async fn execute_hook_with(
        &self,
        hook: Hook,
        payload: &HookPayload,
        mode: DispatchMode,
    ) -> DispatchReport {
        let targets: Vec<(String, Arc<dyn Plugin>)> = {
            let table = self.table.read().await;
            table
                .sorted()
                .into_iter()
                .filter(|r| r.is_enabled() && r.metadata.subscribes_to(hook))
                .map(|r| (r.metadata.name.clone(), r.instance.clone()))
                .collect()
        };

        let report = self.dispatcher.dispatch(hook, payload, &targets, mode).await;
        self.record_failures(&report.invocations).await;
        report
    }

    /// Deliver `hook` to a single plugin if it subscribes, regardless of
    /// state. Used to scope STARTUP and SHUTDOWN to one plugin.
    pub async fn dispatch_to(
        &self,
        name: &str,
        hook: Hook,
        payload: &HookPayload,
    ) -> Option<HookInvocation> {
        let target = {
            let table = self.table.read().await;
            let record = table.records.get(name)?;
            if !record.metadata.subscribes_to(hook) {
                return None;
            }
            (record.metadata.name.clone(), record.instance.clone())
        };

        let report = self
            .dispatcher
            .dispatch(hook, payload, &[target], DispatchMode::BestEffort)
            .await;
        self.record_failures(&report.invocations).await;
        report.invocations.into_iter().next()
    }

    async fn record_failures(&self, invocations: &[HookInvocation]) {
        for invocation in invocations {
            if let Err(e) = &invocation.result {
                self.record_error(&invocation.plugin, e.clone()).await;
            }
        }
    }

    /// Route a command to the plugin that registered it.
    pub async fn execute_command(&self, command: &str, args: Value) -> PluginResult<Value> {
        let (owner, instance) = {
            let table = self.table.read().await;
            let owner = table
                .commands
                .get(command)
                .ok_or_else(|| PluginError::CommandNotFound {
                    command: command.to_string(),
                })?;
            let record = table.record(owner)?;
            if !record.is_enabled() {
                return Err(PluginError::InvalidState {
                    name: owner.clone(),
                    state: record.state,
                    action: "run a command on",
                });
            }
            (owner.clone(), record.instance.clone())
        };

        debug!(plugin = %owner, command = %command, "Executing plugin command");

        let operation = format!("command {command}");
        let result = guarded(
            &owner,
            &operation,
            self.lifecycle_timeout,
            instance.execute_command(command, args),
        )
        .await;

        if let Err(e) = &result {
            warn!(plugin = %owner, command = %command, error = %e, "Plugin command failed");
            self.record_error(&owner, e.clone()).await;
        }
        result
    }

    /// `(command, owner)` pairs for ENABLED plugins, sorted by command.
    pub async fn commands(&self) -> Vec<(String, String)> {
        let table = self.table.read().await;
        let mut commands: Vec<(String, String)> = table
            .commands
            .iter()
            .filter(|(_, owner)| table.records.get(*owner).is_some_and(|r| r.is_enabled()))
            .map(|(c, o)| (c.clone(), o.clone()))
            .collect();
        commands.sort();
        commands
    }

    /// Registry totals.
    pub async fn status(&self) -> RegistryStatus {
        let table = self.table.read().await;
        let mut status = RegistryStatus {
            total: table.records.len(),
            commands: table.commands.len(),
            ..RegistryStatus::default()
        };
        for record in table.records.values() {
            *status.by_state.entry(record.state).or_default() += 1;
            for capability in &record.metadata.capabilities {
                *status.by_capability.entry(*capability).or_default() += 1;
            }
        }
        status
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
