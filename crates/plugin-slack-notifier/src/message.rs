//! Slack message construction.

use serde_json::{Value, json};

use docscope_core::types::{NotificationEvent, NotificationLevel};
use docscope_plugin::HookPayload;

use crate::config::SlackConfig;

/// Attachment colour for a level.
pub fn color_for(level: NotificationLevel) -> &'static str {
    match level {
        NotificationLevel::Info | NotificationLevel::Success => "#36a64f",
        NotificationLevel::Warning => "#ff9900",
        NotificationLevel::Error => "#ff0000",
    }
}

/// Webhook body for `event`.
pub fn webhook_body(config: &SlackConfig, event: &NotificationEvent) -> Value {
    let text = if event.title.is_empty() {
        event.message.clone()
    } else {
        format!("*{}*\n{}", event.title, event.message)
    };
    let fields: Vec<Value> = event
        .fields
        .iter()
        .map(|(title, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            json!({ "title": title, "value": value, "short": true })
        })
        .collect();

    let mut attachment = json!({
        "color": color_for(event.level),
        "text": text,
        "fallback": event.message,
        "footer": "DocScope",
        "ts": event.timestamp.timestamp(),
    });
    if !fields.is_empty() {
        attachment["fields"] = Value::Array(fields);
    }

    json!({
        "channel": config.channel,
        "username": config.username,
        "icon_emoji": config.icon_emoji,
        "attachments": [attachment],
    })
}

/// Summary event for an AFTER_SCAN payload.
///
/// Batch payloads carry `total`/`successful`/`failed`/`duration`; a
/// single-file payload carries `path` and counts as one success.
pub fn scan_completed(payload: &HookPayload) -> NotificationEvent {
    let total = payload.get_u64("total").unwrap_or(1);
    let failed = payload.get_u64("failed").unwrap_or(0);
    let successful = payload
        .get_u64("successful")
        .unwrap_or(total.saturating_sub(failed));
    let duration = payload
        .get_data("duration")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let mut message = format!(
        "Document scan completed:\n• Total: {total} documents\n• Successful: {successful}\n• Failed: {failed}"
    );
    if let Some(path) = payload.get_string("path") {
        message.push_str(&format!("\n• Path: {path}"));
    }

    let level = if failed == 0 {
        NotificationLevel::Success
    } else {
        NotificationLevel::Warning
    };
    NotificationEvent::new(level, "Scan completed", message)
        .with_field("Total Documents", total.to_string())
        .with_field("Duration", format!("{duration:.1}s"))
}

/// Summary event for an AFTER_INDEX payload.
pub fn index_completed(payload: &HookPayload) -> NotificationEvent {
    let count = payload
        .get_u64("indexed")
        .or_else(|| payload.get_u64("count"))
        .unwrap_or(0);
    NotificationEvent::new(
        NotificationLevel::Info,
        "Index updated",
        format!("Successfully indexed {count} document(s)"),
    )
}
