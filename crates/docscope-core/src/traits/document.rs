//! Document-write interface onto the host storage layer.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::Document;

/// Persists documents on behalf of plugins.
#[async_trait]
pub trait DocumentSink: Send + Sync + std::fmt::Debug + 'static {
    /// Store (insert or replace) a document and return its identifier.
    async fn write_document(&self, document: &Document) -> AppResult<String>;
}
