//! Load, enable, disable, unload, reload and persistence.

use docscope_plugin::prelude::*;
use docscope_plugin::{PluginLocator, PluginState};

use crate::helpers::{Script, TestHost};

#[tokio::test]
async fn test_scanner_receives_before_scan_once() {
    let host = TestHost::new(vec![
        Script::new("a")
            .capability(Capability::Scanner)
            .hook(Hook::BeforeScan),
    ]);
    host.enable(&["a"]).await;

    let payload = hook_payload!({ "path" => "/doc.pdf" });
    let report = host.manager.execute_hook(Hook::BeforeScan, &payload).await;

    assert!(report.is_success());
    assert_eq!(host.journal.count("hook:before_scan:a:/doc.pdf"), 1);

    let scanners: Vec<String> = host
        .manager
        .get_plugins_by_capability(Capability::Scanner)
        .await
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(scanners, vec!["a"]);
}

#[tokio::test]
async fn test_loaded_plugin_is_inert_until_enabled() {
    let host = TestHost::new(vec![Script::new("a").hook(Hook::BeforeScan)]);
    host.load("a").await.unwrap();

    assert_eq!(host.state("a").await, PluginState::Loaded);
    let report = host
        .manager
        .execute_hook(Hook::BeforeScan, &hook_payload!({ "path" => "/x" }))
        .await;
    assert!(report.invocations.is_empty());
    assert!(host.journal.events().is_empty());
}

#[tokio::test]
async fn test_disable_calls_shutdown_exactly_once() {
    let host = TestHost::new(vec![Script::new("a")]);
    host.enable(&["a"]).await;

    host.manager.disable_plugin("a").await.unwrap();
    host.manager.disable_plugin("a").await.unwrap();

    assert_eq!(host.state("a").await, PluginState::Disabled);
    assert_eq!(host.journal.count("shutdown:a"), 1);

    // Re-enabling from DISABLED initializes again.
    host.manager.enable_plugin("a").await.unwrap();
    assert_eq!(host.journal.count("init:a"), 2);
}

#[tokio::test]
async fn test_enabling_twice_is_a_noop() {
    let host = TestHost::new(vec![Script::new("a")]);
    host.enable(&["a"]).await;
    host.manager.enable_plugin("a").await.unwrap();

    assert_eq!(host.journal.count("init:a"), 1);
}

#[tokio::test]
async fn test_failed_initialize_moves_to_failed() {
    let host = TestHost::new(vec![Script::new("a").failing_init()]);
    host.load("a").await.unwrap();

    let err = host.manager.enable_plugin("a").await.unwrap_err();
    assert!(matches!(err, PluginError::Runtime { .. }));

    let info = host.manager.get_plugin_info("a").await.unwrap();
    assert_eq!(info.state, PluginState::Failed);
    assert!(info.last_error.unwrap().contains("refusing to start"));

    let err = host.manager.enable_plugin("a").await.unwrap_err();
    assert!(matches!(err, PluginError::InvalidState { action: "enable", .. }));

    host.manager.unload_plugin("a").await.unwrap();
    assert!(!host.manager.registry().contains("a").await);
}

#[tokio::test]
async fn test_unload_enabled_plugin_is_rejected() {
    let host = TestHost::new(vec![Script::new("a")]);
    host.enable(&["a"]).await;

    let err = host.manager.unload_plugin("a").await.unwrap_err();
    assert!(matches!(err, PluginError::InvalidState { .. }));

    host.manager.disable_plugin("a").await.unwrap();
    host.manager.unload_plugin("a").await.unwrap();
    assert!(host.manager.list_plugins(None).await.is_empty());
}

#[tokio::test]
async fn test_reload_restores_enabled_state() {
    let host = TestHost::new(vec![Script::new("a").command("reindex")]);
    host.enable(&["a"]).await;

    host.manager.reload_plugin("a").await.unwrap();

    assert_eq!(host.state("a").await, PluginState::Enabled);
    assert_eq!(
        host.journal.events(),
        vec!["init:a", "shutdown:a", "init:a"]
    );
    // Commands survive the reload.
    host.manager
        .execute_command("reindex", serde_json::json!({}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unknown_plugin_operations() {
    let host = TestHost::new(vec![]);

    assert!(host.manager.enable_plugin("ghost").await.unwrap_err().is_not_found());
    assert!(host.manager.disable_plugin("ghost").await.unwrap_err().is_not_found());
    assert!(host.manager.unload_plugin("ghost").await.unwrap_err().is_not_found());
    assert!(host.manager.get_plugin_info("ghost").await.unwrap_err().is_not_found());

    let err = host
        .manager
        .load_plugin(&PluginLocator::builtin("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::Load { .. }));
}

#[tokio::test]
async fn test_manager_shutdown_is_idempotent() {
    let host = TestHost::new(vec![Script::new("a"), Script::new("b")]);
    host.enable(&["a", "b"]).await;

    assert!(host.manager.shutdown().await.is_empty());
    assert!(host.manager.shutdown().await.is_empty());

    assert_eq!(host.journal.count("shutdown:a"), 1);
    assert_eq!(host.journal.count("shutdown:b"), 1);
}

#[tokio::test]
async fn test_teardown_runs_dependents_first() {
    let scripts = vec![
        Script::new("a"),
        Script::new("b").depends_on("a"),
        Script::new("c").depends_on("b"),
    ];
    let host = TestHost::new(scripts);
    host.enable(&["a", "b", "c"]).await;

    host.manager.shutdown().await;

    assert_eq!(
        host.journal.matching("shutdown:"),
        vec!["shutdown:c", "shutdown:b", "shutdown:a"]
    );
}

#[tokio::test]
async fn test_enabled_set_survives_restart() {
    let scripts = vec![Script::new("a"), Script::new("b").depends_on("a"), Script::new("c")];
    let host = TestHost::new(scripts.clone());
    host.enable(&["a", "b"]).await;
    host.load("c").await.unwrap();
    host.manager.shutdown().await;

    let saved = std::fs::read_to_string(&host.state_file).unwrap();
    assert!(saved.contains("builtin:a"));

    let restarted = host.restart(scripts);
    let results = restarted.manager.restore_state().await.unwrap();

    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(restarted.state("a").await, PluginState::Enabled);
    assert_eq!(restarted.state("b").await, PluginState::Enabled);
    // Only the enabled set is restored.
    assert!(!restarted.manager.registry().contains("c").await);
    assert_eq!(restarted.journal.matching("init:"), vec!["init:a", "init:b"]);
}

#[tokio::test]
async fn test_manifest_locator_loads_catalog_entry() {
    let host = TestHost::new(vec![Script::new("a")]);
    let dir = host.plugins_dir().join("alpha");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("plugin.json"),
        r#"{ "name": "a", "entry": "a", "description": "alpha plugin" }"#,
    )
    .unwrap();

    let candidate = host
        .manager
        .discover()
        .find(|c| matches!(c.locator, PluginLocator::Manifest { .. }))
        .expect("manifest should be discovered");
    assert_eq!(candidate.name.as_deref(), Some("a"));
    assert_eq!(candidate.description.as_deref(), Some("alpha plugin"));

    let name = host.manager.load_plugin(&candidate.locator).await.unwrap();
    assert_eq!(name, "a");
    let info = host.manager.get_plugin_info("a").await.unwrap();
    assert!(info.source.unwrap().ends_with("plugin.json"));
}

#[tokio::test]
async fn test_rejected_duplicate_keeps_live_manifest_config() {
    let host = TestHost::new(vec![Script::new("cfg")]);
    let write = |dir: &str, which: &str| {
        let dir = host.plugins_dir().join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("plugin.json");
        let body = format!(r#"{{ "name": "cfg", "entry": "cfg", "config": {{ "which": "{which}" }} }}"#);
        std::fs::write(&path, body).unwrap();
        PluginLocator::manifest(path)
    };
    let one = write("one", "first");
    let two = write("two", "second");

    host.manager.load_plugin(&one).await.unwrap();
    let err = host.manager.load_plugin(&two).await.unwrap_err();
    assert!(matches!(err, PluginError::AlreadyRegistered { .. }));

    let config = host.manager.loader().load_plugin_config("cfg").unwrap();
    assert_eq!(config["which"], "first");
    host.manager.enable_plugin("cfg").await.unwrap();
    assert_eq!(host.journal.matching("config:"), vec!["config:cfg:first"]);

    host.manager.disable_plugin("cfg").await.unwrap();
    host.manager.unload_plugin("cfg").await.unwrap();
    assert!(host.manager.loader().load_plugin_config("cfg").unwrap().is_empty());

    host.manager.load_plugin(&two).await.unwrap();
    host.manager.enable_plugin("cfg").await.unwrap();
    assert_eq!(
        host.journal.matching("config:"),
        vec!["config:cfg:first", "config:cfg:second"]
    );
}

#[tokio::test]
async fn test_search_and_status() {
    let host = TestHost::new(vec![Script::new("alpha"), Script::new("beta")]);
    host.enable(&["alpha"]).await;
    host.load("beta").await.unwrap();
    host.load("text_scanner").await.unwrap();

    let found: Vec<String> = host
        .manager
        .search_plugins("SCRIPTED", None)
        .await
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(found, vec!["alpha", "beta"]);
    assert_eq!(host.manager.search_plugins("scripted", Some(1)).await.len(), 1);

    let status = host.manager.status().await;
    assert_eq!(status.total, 3);
    assert_eq!(status.by_state.get(&PluginState::Enabled), Some(&1));
    assert_eq!(status.by_state.get(&PluginState::Loaded), Some(&2));
}
