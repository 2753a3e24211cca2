//! Plugin context — the host collaborators a plugin may use.

use std::sync::Arc;

use docscope_core::traits::{DocumentSink, MetricsRecorder, SearchIndex};

use super::services::{InMemoryDocumentStore, InMemoryMetrics, InMemorySearchIndex};

/// Handles handed to every plugin factory.
///
/// Plugins reach storage, search and monitoring only through these narrow
/// interfaces and never hold the subsystems themselves.
#[derive(Clone)]
pub struct PluginContext {
    /// Document writer.
    pub documents: Arc<dyn DocumentSink>,
    /// Search index add/remove.
    pub search: Arc<dyn SearchIndex>,
    /// Metrics recorder.
    pub metrics: Arc<dyn MetricsRecorder>,
}

impl PluginContext {
    pub fn new(
        documents: Arc<dyn DocumentSink>,
        search: Arc<dyn SearchIndex>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            documents,
            search,
            metrics,
        }
    }

    /// A context backed by fresh in-memory services.
    pub fn detached() -> Self {
        Self::new(
            Arc::new(InMemoryDocumentStore::default()),
            Arc::new(InMemorySearchIndex::default()),
            Arc::new(InMemoryMetrics::default()),
        )
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext").finish_non_exhaustive()
    }
}
