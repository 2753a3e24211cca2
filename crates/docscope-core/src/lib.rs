//! # docscope-core
//!
//! Core crate for DocScope. Contains the configuration schema, the document
//! types exchanged with plugins, the narrow collaborator traits plugins use
//! to reach the host (document sink, search index, metrics), and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other DocScope crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
