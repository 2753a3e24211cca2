//! Markdown processor plugin implementation.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use semver::Version;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use docscope_core::types::{Document, ProcessedDocument};
use docscope_plugin::prelude::*;

use crate::ENTRY;
use crate::config::ProcessorConfig;
use crate::markdown;

/// Formats this processor handles.
const MARKDOWN_FORMATS: &[&str] = &["markdown", "md"];

#[derive(Debug)]
pub struct MarkdownProcessorPlugin {
    config: RwLock<ProcessorConfig>,
    health: RwLock<HealthState>,
    stopped: AtomicBool,
}

impl MarkdownProcessorPlugin {
    pub fn new() -> Self {
        Self {
            config: RwLock::new(ProcessorConfig::default()),
            health: RwLock::new(HealthState::Uninitialized),
            stopped: AtomicBool::new(false),
        }
    }

    fn enrich(&self, document: &Document) -> ProcessedDocument {
        let config = self.config.read().clone();
        let mut document = document.clone();
        let mut extracted = Map::new();

        match markdown::split_front_matter(&document.content) {
            Some(Ok((front_matter, body))) => {
                let body = body.to_string();
                extracted.insert("front_matter".into(), front_matter);
                document.content = body;
            }
            Some(Err(reason)) => {
                warn!(document = %document.id, reason = %reason, "Ignoring unparsable front matter");
            }
            None => {}
        }

        if config.extract_toc {
            let toc = markdown::extract_toc(&document.content);
            if !toc.is_empty() {
                extracted.insert("table_of_contents".into(), json!(toc));
            }
        }

        if config.extract_links {
            let links = markdown::extract_links(&document.content);
            if !links.is_empty() {
                let (external, internal): (Vec<&String>, Vec<&String>) =
                    links.iter().partition(|l| markdown::is_external(l));
                extracted.insert("external_links".into(), json!(external));
                extracted.insert("internal_links".into(), json!(internal));
                extracted.insert("links".into(), json!(links));
            }
        }

        if config.extract_code_blocks {
            let blocks = markdown::extract_code_blocks(&document.content);
            if !blocks.is_empty() {
                let languages: BTreeSet<&str> = blocks.iter().map(|b| b.language.as_str()).collect();
                extracted.insert("languages".into(), json!(languages));
                extracted.insert("code_blocks".into(), json!(blocks));
            }
        }

        if config.add_reading_time {
            extracted.insert(
                "reading_time_minutes".into(),
                json!(markdown::reading_time_minutes(&document.content, config.words_per_minute)),
            );
        }

        for (key, value) in &extracted {
            document.metadata.insert(key.clone(), value.clone());
        }

        debug!(document = %document.id, fields = extracted.len(), "Processed markdown document");
        ProcessedDocument {
            document,
            extracted,
            processed_by: vec![ENTRY.to_string()],
        }
    }
}

impl Default for MarkdownProcessorPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for MarkdownProcessorPlugin {
    fn metadata(&self) -> PluginMetadata {
        let mut meta = PluginMetadata::new(ENTRY, Version::new(1, 0, 0))
            .author("DocScope Team")
            .description("Process and enhance Markdown documents with metadata extraction")
            .license("MIT")
            .tag("markdown")
            .tag("processor")
            .tag("toc")
            .tag("metadata")
            .capability(Capability::Processor)
            .hook(Hook::BeforeIndex);
        for option in ProcessorConfig::schema() {
            meta = meta.option(option);
        }
        meta
    }

    fn validate_config(&self, config: &PluginConfigMap) -> PluginResult<()> {
        self.metadata().config_schema.validate(ENTRY, config)?;
        ProcessorConfig::from_map(ENTRY, config).map(|_| ())
    }

    async fn initialize(&self, config: &PluginConfigMap) -> PluginResult<()> {
        *self.config.write() = ProcessorConfig::from_map(ENTRY, config)?;
        *self.health.write() = HealthState::Healthy;
        self.stopped.store(false, Ordering::SeqCst);
        info!("Markdown processor initialized");
        Ok(())
    }

    async fn shutdown(&self) -> PluginResult<()> {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            *self.health.write() = HealthState::Stopped;
            info!("Markdown processor shut down");
        }
        Ok(())
    }

    fn status(&self) -> HealthState {
        self.health.read().clone()
    }

    /// On BEFORE_INDEX, returns the extracted fields for a markdown
    /// `document` in the payload.
    async fn on_hook(&self, hook: Hook, payload: &HookPayload) -> PluginResult<Option<Value>> {
        if hook != Hook::BeforeIndex {
            return Ok(None);
        }
        let Some(raw) = payload.get_data("document") else {
            return Ok(None);
        };
        let document: Document = serde_json::from_value(raw.clone())
            .map_err(|e| PluginError::runtime(ENTRY, format!("invalid document payload: {e}")))?;
        if !self.should_process(&document) {
            return Ok(None);
        }
        Ok(Some(Value::Object(self.enrich(&document).extracted)))
    }

    fn as_processor(&self) -> Option<&dyn ProcessorPlugin> {
        Some(self)
    }
}

#[async_trait]
impl ProcessorPlugin for MarkdownProcessorPlugin {
    fn should_process(&self, document: &Document) -> bool {
        MARKDOWN_FORMATS.contains(&document.format.to_ascii_lowercase().as_str())
    }

    async fn process_document(&self, document: &Document) -> PluginResult<ProcessedDocument> {
        if !self.should_process(document) {
            return Ok(ProcessedDocument::unprocessed(document.clone()));
        }
        Ok(self.enrich(document))
    }
}
