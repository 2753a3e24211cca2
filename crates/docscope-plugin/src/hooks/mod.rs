//! Hook system: hook definitions and the timeout-bounded dispatcher.

pub mod definitions;
pub mod dispatcher;

pub use definitions::{Hook, HookPayload};
pub use dispatcher::{DispatchMode, DispatchReport, HookDispatcher, HookInvocation};
