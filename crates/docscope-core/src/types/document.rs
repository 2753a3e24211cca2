//! Document types produced by scanners and refined by processors.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document as it flows through the scanning and indexing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier (the source path for scanned files).
    pub id: String,
    /// Display title.
    pub title: String,
    /// Extracted text content.
    pub content: String,
    /// Format tag, e.g. `"markdown"`, `"text"`.
    pub format: String,
    /// Source path on disk, if the document came from a file.
    pub path: Option<PathBuf>,
    /// Free-form metadata accumulated by scanners and processors.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    /// Create a document with empty metadata and no source path.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            format: format.into(),
            path: None,
            metadata: Map::new(),
        }
    }

    /// Set the source path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Outcome of scanning a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// The extracted document.
    pub document: Document,
    /// Size of the scanned file.
    pub size_bytes: u64,
    /// Name of the plugin that produced the result.
    pub scanner: String,
    /// When the scan finished.
    pub scanned_at: DateTime<Utc>,
}

/// A document after a processor has run over it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    /// The (possibly rewritten) document.
    pub document: Document,
    /// Structured data the processor extracted.
    #[serde(default)]
    pub extracted: Map<String, Value>,
    /// Names of the processors that touched this document, in order.
    pub processed_by: Vec<String>,
}

impl ProcessedDocument {
    /// Wrap a document that no processor has touched yet.
    pub fn unprocessed(document: Document) -> Self {
        Self {
            document,
            extracted: Map::new(),
            processed_by: Vec::new(),
        }
    }
}
