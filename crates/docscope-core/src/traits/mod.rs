//! Narrow host interfaces defined in `docscope-core` and consumed by plugins.
//!
//! Plugins never hold handles to host internals; they reach the storage
//! layer, the search index and monitoring only through these traits.

pub mod document;
pub mod metrics;
pub mod search;

pub use document::DocumentSink;
pub use metrics::MetricsRecorder;
pub use search::SearchIndex;
