//! Shared test helpers for integration tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use semver::Version;
use serde_json::{Value, json};

use docscope_core::config::plugin::PluginSystemConfig;
use docscope_core::types::{Document, NotificationEvent, ProcessedDocument, ScanResult};
use docscope_plugin::api::services::{InMemoryDocumentStore, InMemoryMetrics, InMemorySearchIndex};
use docscope_plugin::metadata::PluginConfigMap;
use docscope_plugin::prelude::*;
use docscope_plugin::{PluginLoader, PluginLocator, PluginManager, PluginState};

/// Ordered record of everything scripted plugins did.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Events starting with `prefix`, in order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

/// What a scripted plugin does when a hook reaches it.
#[derive(Debug, Clone, Default)]
pub enum HookBehavior {
    #[default]
    Record,
    Fail,
    Sleep(Duration),
    Panic,
}

/// Declarative description of a test plugin.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub name: String,
    pub capabilities: Vec<Capability>,
    pub hooks: Vec<Hook>,
    pub commands: Vec<String>,
    pub deps: Vec<String>,
    pub hook_behavior: HookBehavior,
    pub fail_init: bool,
    pub fail_work: bool,
    pub init_delay: Option<Duration>,
}

impl Script {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.commands.push(command.to_string());
        self
    }

    pub fn depends_on(mut self, name: &str) -> Self {
        self.deps.push(name.to_string());
        self
    }

    pub fn on_hook(mut self, behavior: HookBehavior) -> Self {
        self.hook_behavior = behavior;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Scans panic and processing returns an error.
    pub fn failing_work(mut self) -> Self {
        self.fail_work = true;
        self
    }

    pub fn slow_init(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }
}

/// A plugin whose behavior comes from a [`Script`] and whose actions are
/// written to a [`Journal`].
#[derive(Debug)]
pub struct ScriptedPlugin {
    script: Script,
    journal: Journal,
    stopped: AtomicBool,
}

impl ScriptedPlugin {
    fn has(&self, capability: Capability) -> bool {
        self.script.capabilities.contains(&capability)
    }

    fn log(&self, event: &str) {
        self.journal.push(format!("{event}:{}", self.script.name));
    }
}

#[async_trait]
impl Plugin for ScriptedPlugin {
    fn metadata(&self) -> PluginMetadata {
        let mut meta = PluginMetadata::new(&self.script.name, Version::new(1, 0, 0))
            .description(format!("scripted {}", self.script.name))
            .tag("scripted");
        for capability in &self.script.capabilities {
            meta = meta.capability(*capability);
        }
        for hook in &self.script.hooks {
            meta = meta.hook(*hook);
        }
        for command in &self.script.commands {
            meta = meta.command(command, "");
        }
        for dep in &self.script.deps {
            meta = meta.requires(dep);
        }
        meta
    }

    async fn initialize(&self, config: &PluginConfigMap) -> PluginResult<()> {
        if let Some(delay) = self.script.init_delay {
            tokio::time::sleep(delay).await;
        }
        if self.script.fail_init {
            return Err(PluginError::runtime(&self.script.name, "refusing to start"));
        }
        self.stopped.store(false, Ordering::SeqCst);
        self.log("init");
        if let Some(which) = config.get("which").and_then(Value::as_str) {
            self.journal.push(format!("config:{}:{which}", self.script.name));
        }
        Ok(())
    }

    async fn shutdown(&self) -> PluginResult<()> {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.log("shutdown");
        }
        Ok(())
    }

    fn status(&self) -> HealthState {
        if self.stopped.load(Ordering::SeqCst) {
            HealthState::Stopped
        } else {
            HealthState::Healthy
        }
    }

    async fn on_hook(&self, hook: Hook, payload: &HookPayload) -> PluginResult<Option<Value>> {
        let detail = payload.get_string("path").unwrap_or("-");
        self.journal
            .push(format!("hook:{hook}:{}:{detail}", self.script.name));
        match &self.script.hook_behavior {
            HookBehavior::Record => Ok(Some(json!(self.script.name))),
            HookBehavior::Fail => Err(PluginError::runtime(&self.script.name, "hook failed")),
            HookBehavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(None)
            }
            HookBehavior::Panic => panic!("{} exploded", self.script.name),
        }
    }

    async fn execute_command(&self, command: &str, args: Value) -> PluginResult<Value> {
        self.log(&format!("command:{command}"));
        Ok(json!({ "owner": self.script.name, "args": args }))
    }

    fn as_scanner(&self) -> Option<&dyn ScannerPlugin> {
        self.has(Capability::Scanner).then_some(self as &dyn ScannerPlugin)
    }

    fn as_processor(&self) -> Option<&dyn ProcessorPlugin> {
        self.has(Capability::Processor).then_some(self as &dyn ProcessorPlugin)
    }

    fn as_notifier(&self) -> Option<&dyn NotificationPlugin> {
        self.has(Capability::Notification).then_some(self as &dyn NotificationPlugin)
    }
}

#[async_trait]
impl ScannerPlugin for ScriptedPlugin {
    fn can_handle(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "pdf")
    }

    async fn scan_file(&self, path: &Path) -> PluginResult<ScanResult> {
        self.log("scan");
        if self.script.fail_work {
            panic!("{} cannot read {}", self.script.name, path.display());
        }
        Ok(ScanResult {
            document: Document::new(path.display().to_string(), "scanned", "body", "pdf"),
            size_bytes: 4,
            scanner: self.script.name.clone(),
            scanned_at: Utc::now(),
        })
    }

    fn supported_formats(&self) -> Vec<String> {
        vec![".pdf".to_string()]
    }
}

#[async_trait]
impl ProcessorPlugin for ScriptedPlugin {
    fn should_process(&self, _document: &Document) -> bool {
        true
    }

    async fn process_document(&self, document: &Document) -> PluginResult<ProcessedDocument> {
        self.log("process");
        if self.script.fail_work {
            return Err(PluginError::runtime(&self.script.name, "cannot process"));
        }
        let mut processed = ProcessedDocument::unprocessed(document.clone());
        processed.document.content.push_str(&format!(" +{}", self.script.name));
        processed.processed_by.push(self.script.name.clone());
        Ok(processed)
    }
}

#[async_trait]
impl NotificationPlugin for ScriptedPlugin {
    async fn send_notification(&self, event: &NotificationEvent) -> PluginResult<()> {
        self.journal
            .push(format!("notify:{}:{}", self.script.name, event.message));
        Ok(())
    }
}

/// Descriptor that instantiates `script`, journaling into `journal`.
pub fn scripted(script: Script, journal: &Journal) -> PluginDescriptor {
    let journal = journal.clone();
    PluginDescriptor::new(script.name.clone(), move |_ctx| {
        Arc::new(ScriptedPlugin {
            script: script.clone(),
            journal: journal.clone(),
            stopped: AtomicBool::new(false),
        }) as Arc<dyn Plugin>
    })
}

/// A manager over in-memory host services and a private temp directory.
pub struct TestHost {
    pub manager: PluginManager,
    pub journal: Journal,
    pub documents: Arc<InMemoryDocumentStore>,
    pub search: Arc<InMemorySearchIndex>,
    pub metrics: Arc<InMemoryMetrics>,
    pub state_file: PathBuf,
    pub dir: Arc<tempfile::TempDir>,
}

impl TestHost {
    /// Host with the given scripted plugins and the built-in catalog.
    pub fn new(scripts: Vec<Script>) -> Self {
        Self::with_config(scripts, |_| {})
    }

    pub fn with_config(scripts: Vec<Script>, configure: impl FnOnce(&mut PluginSystemConfig)) -> Self {
        let dir = Arc::new(tempfile::tempdir().expect("Failed to create temp dir"));
        Self::build(scripts, dir, Journal::default(), configure)
    }

    /// A second host sharing this one's directory (and so its state file),
    /// as after a process restart.
    pub fn restart(&self, scripts: Vec<Script>) -> Self {
        Self::build(scripts, self.dir.clone(), Journal::default(), |_| {})
    }

    fn build(
        scripts: Vec<Script>,
        dir: Arc<tempfile::TempDir>,
        journal: Journal,
        configure: impl FnOnce(&mut PluginSystemConfig),
    ) -> Self {
        let state_file = dir.path().join("state/plugins.json");
        let mut config = PluginSystemConfig {
            directories: vec![dir.path().join("plugins")],
            state_file: Some(state_file.clone()),
            ..PluginSystemConfig::default()
        };
        configure(&mut config);

        let documents = Arc::new(InMemoryDocumentStore::default());
        let search = Arc::new(InMemorySearchIndex::default());
        let metrics = Arc::new(InMemoryMetrics::default());
        let context = PluginContext::new(documents.clone(), search.clone(), metrics.clone());

        let loader = PluginLoader::new(config, context);
        for descriptor in docscope::builtin_descriptors() {
            loader
                .register_descriptor(descriptor)
                .expect("Failed to register builtin");
        }
        for script in scripts {
            loader
                .register_descriptor(scripted(script, &journal))
                .expect("Failed to register scripted plugin");
        }

        Self {
            manager: PluginManager::new(loader),
            journal,
            documents,
            search,
            metrics,
            state_file,
            dir,
        }
    }

    /// Load and enable `names` in order.
    pub async fn enable(&self, names: &[&str]) {
        for name in names {
            if !self.manager.registry().contains(name).await {
                self.load(name).await.expect("Failed to load plugin");
            }
            self.manager
                .enable_plugin(name)
                .await
                .expect("Failed to enable plugin");
        }
    }

    /// Load `name` from its builtin catalog entry.
    pub async fn load(&self, name: &str) -> PluginResult<String> {
        self.manager
            .load_plugin(&PluginLocator::builtin(name))
            .await
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.dir.path().join("plugins")
    }

    pub async fn state(&self, name: &str) -> PluginState {
        self.manager
            .get_plugin_info(name)
            .await
            .expect("plugin should be registered")
            .state
    }
}
