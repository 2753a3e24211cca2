//! Add/remove interface onto the host search index.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::Document;

/// Search index operations available to plugins.
#[async_trait]
pub trait SearchIndex: Send + Sync + std::fmt::Debug + 'static {
    /// Add or update a document in the index.
    async fn add_document(&self, document: &Document) -> AppResult<()>;

    /// Remove a document from the index by identifier.
    async fn remove_document(&self, id: &str) -> AppResult<()>;
}
