//! Convenience macros for plugin development.

/// Builds a [`HookPayload`](crate::hooks::HookPayload) from key/value pairs.
///
/// Values go through `serde_json::json!`, so any serializable expression
/// works.
///
/// # Example
/// ```rust,ignore
/// let payload = hook_payload!({
///     "path" => "/docs/readme.md",
///     "size_bytes" => 2048,
/// });
/// ```
#[macro_export]
macro_rules! hook_payload {
    () => {
        $crate::hooks::HookPayload::new()
    };
    ({ $($key:expr => $value:expr),* $(,)? }) => {{
        let mut payload = $crate::hooks::HookPayload::new();
        $(
            payload
                .data
                .insert($key.to_string(), ::serde_json::json!($value));
        )*
        payload
    }};
}
