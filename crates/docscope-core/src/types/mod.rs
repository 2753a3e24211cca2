//! Core type definitions exchanged between the host and plugins.

pub mod document;
pub mod notification;

pub use document::{Document, ProcessedDocument, ScanResult};
pub use notification::{NotificationEvent, NotificationLevel};
