//! Capability pipelines run by the host over ENABLED plugins.
//!
//! Scanning picks the first scanner that accepts a path, processing chains
//! every interested processor, and notification fans an event out to every
//! notifier that handles its level. The surrounding hooks fire at the
//! matching points so hook subscribers see the same flow.

use std::path::Path;

use serde_json::json;
use tracing::{debug, info, warn};

use docscope_core::types::{Document, NotificationEvent, ProcessedDocument, ScanResult};

use crate::error::{PluginError, PluginResult};
use crate::guard::{guarded, guarded_sync};
use crate::hooks::definitions::{Hook, HookPayload};
use crate::manager::PluginManager;
use crate::metadata::Capability;

impl PluginManager {
    /// Scan `path` with the first ENABLED scanner whose `can_handle`
    /// accepts it. `Ok(None)` when no scanner does.
    ///
    /// Fires BEFORE_SCAN and AFTER_SCAN around the scan.
    pub async fn scan_file(&self, path: &Path) -> PluginResult<Option<ScanResult>> {
        let path_str = path.display().to_string();
        let before = HookPayload::new().with_string("path", &path_str);
        self.execute_hook(Hook::BeforeScan, &before).await;

        let timeout = self.registry().lifecycle_timeout();
        for (name, plugin) in self
            .registry()
            .enabled_with_capability(Capability::Scanner)
            .await
        {
            let Some(scanner) = plugin.as_scanner() else {
                continue;
            };
            let accepted = guarded_sync(&name, "can_handle", || scanner.can_handle(path));
            if !self.recorded(&name, accepted).await? {
                continue;
            }

            debug!(plugin = %name, path = %path_str, "Scanning file");
            let result = guarded(&name, "scan_file", timeout, scanner.scan_file(path))
                .await
                .inspect_err(|e| warn!(plugin = %name, path = %path_str, error = %e, "Scan failed"));
            let result = self.recorded(&name, result).await?;

            let after = HookPayload::new()
                .with_string("path", &path_str)
                .with_string("scanner", &name)
                .with_data("document_id", result.document.id.clone())
                .with_data("size_bytes", result.size_bytes);
            self.execute_hook(Hook::AfterScan, &after).await;
            return Ok(Some(result));
        }

        debug!(path = %path_str, "No scanner accepted file");
        Ok(None)
    }

    /// Run `document` through every ENABLED processor whose
    /// `should_process` accepts it, in registration order. Each processor
    /// sees the previous one's output.
    pub async fn process_document(&self, document: &Document) -> PluginResult<ProcessedDocument> {
        let timeout = self.registry().lifecycle_timeout();
        let mut processed = ProcessedDocument::unprocessed(document.clone());

        for (name, plugin) in self
            .registry()
            .enabled_with_capability(Capability::Processor)
            .await
        {
            let Some(processor) = plugin.as_processor() else {
                continue;
            };
            let current = &processed.document;
            let wanted = guarded_sync(&name, "should_process", || processor.should_process(current));
            if !self.recorded(&name, wanted).await? {
                continue;
            }

            let output = guarded(
                &name,
                "process_document",
                timeout,
                processor.process_document(current),
            )
            .await
            .inspect_err(|e| warn!(plugin = %name, error = %e, "Processing failed"));
            let output = self.recorded(&name, output).await?;

            processed.document = output.document;
            processed.extracted.extend(output.extracted);
            processed.processed_by.push(name);
        }

        Ok(processed)
    }

    /// Keep a failed call on the plugin's record as `last_error`.
    async fn recorded<T>(&self, name: &str, result: PluginResult<T>) -> PluginResult<T> {
        if let Err(e) = &result {
            self.registry().record_error(name, e.clone()).await;
        }
        result
    }

    /// Process and index a document, writing it through the host context.
    ///
    /// Fires BEFORE_INDEX with the raw document and AFTER_INDEX once it is
    /// stored. Returns the stored document's id.
    pub async fn index_document(&self, document: &Document) -> PluginResult<String> {
        let before = HookPayload::new()
            .with_data("document_id", document.id.clone())
            .with_data("document", json!(document));
        self.execute_hook(Hook::BeforeIndex, &before).await;

        let processed = self.process_document(document).await?;
        let context = self.loader().context();
        let index_error = |e: docscope_core::AppError| PluginError::Runtime {
            name: "host".to_string(),
            message: e.to_string(),
        };
        let id = context
            .documents
            .write_document(&processed.document)
            .await
            .map_err(index_error)?;
        context
            .search
            .add_document(&processed.document)
            .await
            .map_err(index_error)?;

        let after = HookPayload::new()
            .with_data("document_id", id.clone())
            .with_data("processed_by", json!(processed.processed_by))
            .with_int("count", 1);
        self.execute_hook(Hook::AfterIndex, &after).await;

        info!(document_id = %id, processors = processed.processed_by.len(), "Document indexed");
        Ok(id)
    }

    /// Send `event` to every ENABLED notifier that handles its level.
    ///
    /// One failing notifier does not stop the others; each result is
    /// returned alongside the notifier's name.
    pub async fn notify(&self, event: &NotificationEvent) -> Vec<(String, PluginResult<()>)> {
        let timeout = self.registry().lifecycle_timeout();
        let mut results = Vec::new();

        for (name, plugin) in self
            .registry()
            .enabled_with_capability(Capability::Notification)
            .await
        {
            let Some(notifier) = plugin.as_notifier() else {
                continue;
            };
            let levels = match guarded_sync(&name, "notification_levels", || {
                notifier.notification_levels()
            }) {
                Ok(levels) => levels,
                Err(e) => {
                    results.push((name, Err(e)));
                    continue;
                }
            };
            if !levels.contains(&event.level) {
                continue;
            }

            let result = guarded(&name, "send_notification", timeout, notifier.send_notification(event)).await;
            if let Err(e) = &result {
                warn!(plugin = %name, level = %event.level, error = %e, "Notification failed");
                self.registry().record_error(&name, e.clone()).await;
            }
            results.push((name, result));
        }

        results
    }
}
