//! Boundary wrappers for calls into plugin code.
//!
//! Every call the host makes into a plugin goes through [`guarded`] (async)
//! or [`guarded_sync`], so a slow plugin becomes a `Timeout` and a panicking
//! plugin becomes a `Panicked` error recorded against that plugin only.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use futures::FutureExt;
use tracing::error;

use crate::error::{PluginError, PluginResult};

/// Runs a plugin future under a timeout, converting panics into errors.
///
/// No cancellation is attempted beyond dropping the future when the
/// timeout elapses.
pub async fn guarded<T, F>(
    plugin: &str,
    operation: &str,
    timeout: Duration,
    future: F,
) -> PluginResult<T>
where
    F: Future<Output = PluginResult<T>>,
{
    match tokio::time::timeout(timeout, AssertUnwindSafe(future).catch_unwind()).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => {
            let message = panic_message(panic.as_ref());
            error!(plugin = %plugin, operation = %operation, message = %message, "Plugin panicked");
            Err(PluginError::Panicked {
                name: plugin.to_string(),
                operation: operation.to_string(),
                message,
            })
        }
        Err(_) => {
            error!(
                plugin = %plugin,
                operation = %operation,
                timeout_ms = timeout.as_millis() as u64,
                "Plugin call timed out"
            );
            Err(PluginError::Timeout {
                name: plugin.to_string(),
                operation: operation.to_string(),
                timeout,
            })
        }
    }
}

/// Runs a synchronous plugin call, converting panics into errors.
pub fn guarded_sync<T>(
    plugin: &str,
    operation: &str,
    call: impl FnOnce() -> T,
) -> PluginResult<T> {
    panic::catch_unwind(AssertUnwindSafe(call)).map_err(|panic| {
        let message = panic_message(panic.as_ref());
        error!(plugin = %plugin, operation = %operation, message = %message, "Plugin panicked");
        PluginError::Panicked {
            name: plugin.to_string(),
            operation: operation.to_string(),
            message,
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
