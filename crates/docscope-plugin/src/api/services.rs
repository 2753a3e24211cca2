//! In-memory implementations of the host collaborator traits.
//!
//! Used when the plugin system runs without the storage, search and
//! monitoring subsystems attached.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use docscope_core::result::AppResult;
use docscope_core::traits::{DocumentSink, MetricsRecorder, SearchIndex};
use docscope_core::types::Document;

/// Keeps written documents in memory, keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<BTreeMap<String, Document>>,
}

impl InMemoryDocumentStore {
    pub fn get(&self, id: &str) -> Option<Document> {
        self.documents.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentSink for InMemoryDocumentStore {
    async fn write_document(&self, document: &Document) -> AppResult<String> {
        debug!(document_id = %document.id, "Storing document");
        self.documents
            .write()
            .insert(document.id.clone(), document.clone());
        Ok(document.id.clone())
    }
}

/// Tracks indexed document ids.
#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    ids: RwLock<BTreeMap<String, String>>,
}

impl InMemorySearchIndex {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn add_document(&self, document: &Document) -> AppResult<()> {
        self.ids
            .write()
            .insert(document.id.clone(), document.title.clone());
        Ok(())
    }

    async fn remove_document(&self, id: &str) -> AppResult<()> {
        self.ids.write().remove(id);
        Ok(())
    }
}

/// Accumulates counters and the last value of each gauge.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<HashMap<String, u64>>,
    gauges: Mutex<HashMap<String, f64>>,
}

impl InMemoryMetrics {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.gauges.lock().get(name).copied()
    }
}

impl MetricsRecorder for InMemoryMetrics {
    fn record_metric(&self, name: &str, value: f64) {
        self.gauges.lock().insert(name.to_string(), value);
    }

    fn increment_counter(&self, name: &str, by: u64) {
        *self.counters.lock().entry(name.to_string()).or_insert(0) += by;
    }
}
