//! Text scanner plugin implementation.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use semver::Version;
use serde_json::{Value, json};
use tracing::{debug, info};

use docscope_core::traits::MetricsRecorder;
use docscope_core::types::{Document, ScanResult};
use docscope_plugin::prelude::*;

use crate::ENTRY;
use crate::config::ScannerConfig;
use crate::extract::{TextStats, derive_title, format_for_extension};

/// Scans plain-text style files from disk.
#[derive(Debug)]
pub struct TextScannerPlugin {
    config: RwLock<ScannerConfig>,
    health: RwLock<HealthState>,
    stopped: AtomicBool,
    metrics: Arc<dyn MetricsRecorder>,
}

impl TextScannerPlugin {
    pub fn new(metrics: Arc<dyn MetricsRecorder>) -> Self {
        Self {
            config: RwLock::new(ScannerConfig::default()),
            health: RwLock::new(HealthState::Uninitialized),
            stopped: AtomicBool::new(false),
            metrics,
        }
    }

    pub fn config(&self) -> ScannerConfig {
        self.config.read().clone()
    }

    fn extension(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

#[async_trait]
impl Plugin for TextScannerPlugin {
    fn metadata(&self) -> PluginMetadata {
        let mut meta = PluginMetadata::new(ENTRY, Version::new(1, 0, 0))
            .author("DocScope Team")
            .description("Scan and extract text from plain-text and markdown files")
            .license("MIT")
            .tag("text")
            .tag("markdown")
            .tag("scanner")
            .capability(Capability::Scanner)
            .hook(Hook::BeforeScan);
        for option in ScannerConfig::schema() {
            meta = meta.option(option);
        }
        meta
    }

    fn validate_config(&self, config: &PluginConfigMap) -> PluginResult<()> {
        let metadata = self.metadata();
        metadata.config_schema.validate(ENTRY, config)?;
        ScannerConfig::from_map(ENTRY, config).map(|_| ())
    }

    async fn initialize(&self, config: &PluginConfigMap) -> PluginResult<()> {
        let config = ScannerConfig::from_map(ENTRY, config)?;
        info!(extensions = ?config.extensions, "Text scanner initialized");
        *self.config.write() = config;
        *self.health.write() = HealthState::Healthy;
        self.stopped.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> PluginResult<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        *self.health.write() = HealthState::Stopped;
        info!("Text scanner shut down");
        Ok(())
    }

    fn status(&self) -> HealthState {
        self.health.read().clone()
    }

    async fn on_hook(&self, hook: Hook, payload: &HookPayload) -> PluginResult<Option<Value>> {
        if hook != Hook::BeforeScan {
            return Ok(None);
        }
        let Some(path) = payload.get_string("path") else {
            return Ok(None);
        };
        let accepts = self.can_handle(Path::new(path));
        debug!(path = %path, accepts, "Text scanner checked file");
        Ok(Some(json!({ "accepts": accepts })))
    }

    fn as_scanner(&self) -> Option<&dyn ScannerPlugin> {
        Some(self)
    }
}

#[async_trait]
impl ScannerPlugin for TextScannerPlugin {
    fn can_handle(&self, path: &Path) -> bool {
        Self::extension(path).is_some_and(|ext| self.config.read().accepts_extension(&ext))
    }

    async fn scan_file(&self, path: &Path) -> PluginResult<ScanResult> {
        if !self.can_handle(path) {
            return Err(PluginError::runtime(
                ENTRY,
                format!("cannot handle file: {}", path.display()),
            ));
        }
        let config = self.config();
        let io_error =
            |e: std::io::Error| PluginError::runtime(ENTRY, format!("{}: {e}", path.display()));

        let file_meta = tokio::fs::metadata(path).await.map_err(io_error)?;
        if file_meta.len() > config.max_file_size_bytes {
            return Err(PluginError::runtime(
                ENTRY,
                format!(
                    "{} is {} bytes, limit is {}",
                    path.display(),
                    file_meta.len(),
                    config.max_file_size_bytes
                ),
            ));
        }

        let bytes = tokio::fs::read(path).await.map_err(io_error)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();

        let extension = Self::extension(path).unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = if config.extract_metadata {
            derive_title(&content).unwrap_or(stem)
        } else {
            stem
        };

        let mut document = Document::new(
            path.display().to_string(),
            title,
            content,
            format_for_extension(&extension),
        )
        .with_path(path)
        .with_metadata("plugin", ENTRY)
        .with_metadata("extension", extension);

        if config.extract_metadata {
            let stats = TextStats::of(&document.content);
            document = document
                .with_metadata("line_count", stats.lines)
                .with_metadata("word_count", stats.words)
                .with_metadata("char_count", stats.chars);
            if let Ok(modified) = file_meta.modified() {
                let modified: DateTime<Utc> = modified.into();
                document = document.with_metadata("modified_at", modified.to_rfc3339());
            }
        }

        self.metrics.increment_counter("text_scanner.files_scanned", 1);
        self.metrics
            .record_metric("text_scanner.bytes_scanned", file_meta.len() as f64);
        debug!(path = %path.display(), bytes = file_meta.len(), "Scanned file");

        Ok(ScanResult {
            document,
            size_bytes: file_meta.len(),
            scanner: ENTRY.to_string(),
            scanned_at: Utc::now(),
        })
    }

    fn supported_formats(&self) -> Vec<String> {
        self.config.read().extensions.clone()
    }
}
