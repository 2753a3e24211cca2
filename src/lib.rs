//! # docscope
//!
//! Host-side wiring for the DocScope plugin system: the catalog of
//! built-in plugins, manager construction and startup sequencing, and
//! logging setup. Shared by the `docscope-host` binary and the CLI.

pub mod bootstrap;
pub mod logging;

pub use bootstrap::{StartupReport, build_manager, builtin_descriptors, start};
