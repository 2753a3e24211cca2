//! Hook dispatcher — calls subscribers one at a time and collects results.
//!
//! Each subscriber runs under its own timeout. A failure, timeout or panic
//! in one subscriber is recorded in its [`HookInvocation`] and, in
//! best-effort mode, does not prevent later subscribers from running.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use docscope_core::config::plugin::PluginSystemConfig;

use super::definitions::{Hook, HookPayload};
use crate::contract::Plugin;
use crate::error::{PluginError, PluginResult};
use crate::guard::guarded;

/// What to do when a subscriber fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Call every subscriber and collect all results.
    #[default]
    BestEffort,
    /// Stop at the first failing subscriber.
    FailFast,
}

/// Result of delivering a hook to one plugin.
#[derive(Debug, Clone)]
pub struct HookInvocation {
    pub plugin: String,
    pub result: PluginResult<Option<Value>>,
    pub elapsed: Duration,
}

/// Aggregated result of dispatching a hook.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub hook: Hook,
    /// One entry per plugin called, in call order.
    pub invocations: Vec<HookInvocation>,
    /// Whether fail-fast dispatch stopped early.
    pub halted: bool,
}

impl DispatchReport {
    pub fn empty(hook: Hook) -> Self {
        Self {
            hook,
            invocations: Vec::new(),
            halted: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.invocations.iter().all(|i| i.result.is_ok())
    }

    /// `(plugin, error)` for every failed invocation.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &PluginError)> {
        self.invocations
            .iter()
            .filter_map(|i| i.result.as_ref().err().map(|e| (i.plugin.as_str(), e)))
    }

    /// `(plugin, value)` for every invocation that returned output.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.invocations.iter().filter_map(|i| match &i.result {
            Ok(Some(value)) => Some((i.plugin.as_str(), value)),
            _ => None,
        })
    }

    /// The first failure, for callers that requested fail-fast semantics.
    pub fn into_result(self) -> PluginResult<Self> {
        let first = self.failures().next().map(|(_, e)| e.clone());
        match first {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

/// Delivers hooks to plugins under per-plugin timeouts.
#[derive(Debug, Clone)]
pub struct HookDispatcher {
    default_timeout: Duration,
    overrides: HashMap<String, Duration>,
}

impl HookDispatcher {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            overrides: HashMap::new(),
        }
    }

    pub fn from_config(config: &PluginSystemConfig) -> Self {
        let mut dispatcher = Self::new(config.hook_timeout());
        for (plugin, ms) in &config.timeout_overrides_ms {
            dispatcher
                .overrides
                .insert(plugin.clone(), Duration::from_millis(*ms));
        }
        dispatcher
    }

    /// Use a different timeout for one plugin.
    pub fn with_override(mut self, plugin: impl Into<String>, timeout: Duration) -> Self {
        self.overrides.insert(plugin.into(), timeout);
        self
    }

    pub fn timeout_for(&self, plugin: &str) -> Duration {
        self.overrides
            .get(plugin)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    /// Deliver `payload` to `targets` in order.
    pub async fn dispatch(
        &self,
        hook: Hook,
        payload: &HookPayload,
        targets: &[(String, Arc<dyn Plugin>)],
        mode: DispatchMode,
    ) -> DispatchReport {
        if targets.is_empty() {
            return DispatchReport::empty(hook);
        }

        debug!(hook = %hook, subscribers = targets.len(), "Dispatching hook");

        let mut report = DispatchReport::empty(hook);
        for (name, plugin) in targets {
            let started = Instant::now();
            let result = guarded(
                name,
                hook.as_str(),
                self.timeout_for(name),
                plugin.on_hook(hook, payload),
            )
            .await;
            let elapsed = started.elapsed();

            let failed = match &result {
                Ok(_) => {
                    debug!(hook = %hook, plugin = %name, elapsed_ms = elapsed.as_millis() as u64, "Hook handled");
                    false
                }
                Err(e) => {
                    warn!(hook = %hook, plugin = %name, error = %e, "Hook handler failed");
                    true
                }
            };

            report.invocations.push(HookInvocation {
                plugin: name.clone(),
                result,
                elapsed,
            });

            if failed && mode == DispatchMode::FailFast {
                report.halted = true;
                break;
            }
        }
        report
    }
}

impl Default for HookDispatcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
