//! The bundled plugins running inside a manager.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use docscope_core::types::{Document, NotificationEvent, NotificationLevel};
use docscope_plugin::prelude::*;
use docscope_plugin::PluginState;

use crate::helpers::{Script, TestHost};

const GUIDE: &str = "# User Guide\n\n## Install\n\nSee [the docs](https://example.com/docs) and [setup](setup.md).\n\n```rust\nfn main() {}\n```\n";

#[tokio::test]
async fn test_scan_and_index_markdown() {
    let host = TestHost::new(vec![]);
    host.enable(&["text_scanner", "markdown_processor"]).await;

    let file = host.dir.path().join("guide.md");
    std::fs::write(&file, GUIDE).unwrap();

    let scanned = host
        .manager
        .scan_file(&file)
        .await
        .unwrap()
        .expect("text scanner should accept .md");
    assert_eq!(scanned.scanner, "text_scanner");
    assert_eq!(scanned.document.format, "markdown");
    assert_eq!(scanned.document.title, "User Guide");
    assert_eq!(host.metrics.counter("text_scanner.files_scanned"), 1);

    let id = host.manager.index_document(&scanned.document).await.unwrap();

    let stored = host.documents.get(&id).expect("document should be stored");
    assert!(host.search.contains(&id));
    let toc = stored.metadata["table_of_contents"].as_array().unwrap();
    assert_eq!(toc.len(), 2);
    assert_eq!(stored.metadata["external_links"], json!(["https://example.com/docs"]));
    assert_eq!(stored.metadata["languages"], json!(["rust"]));
}

#[tokio::test]
async fn test_unhandled_file_is_skipped() {
    let host = TestHost::new(vec![]);
    host.enable(&["text_scanner"]).await;

    let file = host.dir.path().join("image.bin");
    std::fs::write(&file, [0u8, 1, 2]).unwrap();

    assert!(host.manager.scan_file(&file).await.unwrap().is_none());
}

#[tokio::test]
async fn test_first_accepting_scanner_wins() {
    let host = TestHost::new(vec![Script::new("pdf").capability(Capability::Scanner)]);
    host.enable(&["text_scanner", "pdf"]).await;

    let result = host
        .manager
        .scan_file(std::path::Path::new("/reports/q3.pdf"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.scanner, "pdf");
    assert_eq!(host.journal.events(), vec!["init:pdf", "scan:pdf"]);
}

#[tokio::test]
async fn test_processors_chain_in_registration_order() {
    let host = TestHost::new(vec![
        Script::new("first").capability(Capability::Processor),
        Script::new("second").capability(Capability::Processor),
    ]);
    host.enable(&["first", "second"]).await;

    let doc = Document::new("doc-1", "Doc", "body", "text");
    let processed = host.manager.process_document(&doc).await.unwrap();

    assert_eq!(processed.processed_by, vec!["first", "second"]);
    assert_eq!(processed.document.content, "body +first +second");
}

#[tokio::test]
async fn test_scanner_panic_is_kept_as_last_error() {
    let host = TestHost::new(vec![Script::new("bad")
        .capability(Capability::Scanner)
        .failing_work()]);
    host.enable(&["bad"]).await;

    let err = host
        .manager
        .scan_file(std::path::Path::new("/doc.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::Panicked { ref operation, .. } if operation == "scan_file"));

    let info = host.manager.get_plugin_info("bad").await.unwrap();
    assert_eq!(info.state, PluginState::Enabled);
    let last_error = info.last_error.expect("scan failure should be recorded");
    assert!(last_error.contains("panicked during scan_file"));
}

#[tokio::test]
async fn test_processor_failure_is_kept_as_last_error() {
    let host = TestHost::new(vec![
        Script::new("good").capability(Capability::Processor),
        Script::new("bad").capability(Capability::Processor).failing_work(),
    ]);
    host.enable(&["good", "bad"]).await;

    let doc = Document::new("doc-1", "Doc", "body", "text");
    let err = host.manager.process_document(&doc).await.unwrap_err();
    assert!(matches!(err, PluginError::Runtime { ref name, .. } if name == "bad"));

    let bad = host.manager.get_plugin_info("bad").await.unwrap();
    assert_eq!(bad.state, PluginState::Enabled);
    assert!(bad.last_error.unwrap().contains("cannot process"));
    assert!(host.manager.get_plugin_info("good").await.unwrap().last_error.is_none());
}

#[tokio::test]
async fn test_notify_respects_enabled_state() {
    let host = TestHost::new(vec![Script::new("pager").capability(Capability::Notification)]);
    host.load("pager").await.unwrap();

    let event = NotificationEvent::new(NotificationLevel::Error, "Indexer", "disk full");
    assert!(host.manager.notify(&event).await.is_empty());

    host.manager.enable_plugin("pager").await.unwrap();
    let results = host.manager.notify(&event).await;
    assert_eq!(results.len(), 1);
    assert!(results[0].1.is_ok());
    assert_eq!(host.journal.events().last().unwrap(), "notify:pager:disk full");
}

#[tokio::test]
async fn test_slack_posts_after_index() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({ "channel": "#docs", "username": "DocScope" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let webhook = format!("{}/hook", server.uri());
    let host = TestHost::with_config(vec![], |config| {
        config.settings.insert(
            "slack_notifier".to_string(),
            json!({ "webhook_url": webhook, "channel": "#docs" }),
        );
    });
    host.enable(&["slack_notifier"]).await;

    let doc = Document::new("doc-1", "Doc", "body", "text");
    host.manager.index_document(&doc).await.unwrap();

    server.verify().await;
    let info = host.manager.get_plugin_info("slack_notifier").await.unwrap();
    assert_eq!(info.health, HealthState::Healthy);
    assert!(info.last_error.is_none());
}

#[tokio::test]
async fn test_slack_failure_is_recorded_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let webhook = server.uri();
    let host = TestHost::with_config(vec![], |config| {
        config
            .settings
            .insert("slack_notifier".to_string(), json!({ "webhook_url": webhook }));
    });
    host.enable(&["slack_notifier"]).await;

    let doc = Document::new("doc-2", "Doc", "body", "text");
    host.manager.index_document(&doc).await.unwrap();
    assert!(host.documents.get("doc-2").is_some());

    let info = host.manager.get_plugin_info("slack_notifier").await.unwrap();
    assert_eq!(info.state, PluginState::Enabled);
    assert!(matches!(info.health, HealthState::Degraded { .. }));
    assert!(info.last_error.unwrap().contains("500"));
}

#[tokio::test]
async fn test_slack_without_webhook_stays_loaded() {
    let host = TestHost::new(vec![]);
    host.load("slack_notifier").await.unwrap();

    let err = host.manager.enable_plugin("slack_notifier").await.unwrap_err();
    assert!(matches!(err, PluginError::Config { .. }));

    let info = host.manager.get_plugin_info("slack_notifier").await.unwrap();
    assert_eq!(info.state, PluginState::Loaded);
    assert!(info.last_error.is_some());
}

#[tokio::test]
async fn test_startup_enables_configured_plugins() {
    let host = TestHost::with_config(vec![], |config| {
        config.auto_load = false;
        config.enabled = vec!["text_scanner".to_string(), "missing".to_string()];
    });

    let report = docscope::start(&host.manager).await.unwrap();

    assert_eq!(report.enabled, vec!["text_scanner"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "missing");
    assert_eq!(host.state("text_scanner").await, PluginState::Enabled);
}
