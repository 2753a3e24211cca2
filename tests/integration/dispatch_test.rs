//! Hook dispatch ordering, isolation and command routing.

use std::time::{Duration, Instant};

use serde_json::json;

use docscope_plugin::hooks::{DispatchMode, DispatchReport};
use docscope_plugin::prelude::*;
use docscope_plugin::PluginState;

use crate::helpers::{HookBehavior, Script, TestHost};

fn subscriber(name: &str, behavior: HookBehavior) -> Script {
    Script::new(name).hook(Hook::AfterIndex).on_hook(behavior)
}

fn callers(report: &DispatchReport) -> Vec<&str> {
    report.invocations.iter().map(|i| i.plugin.as_str()).collect()
}

#[tokio::test]
async fn test_failing_subscriber_does_not_block_later_ones() {
    let host = TestHost::new(vec![
        subscriber("a", HookBehavior::Record),
        subscriber("b", HookBehavior::Fail),
        subscriber("c", HookBehavior::Record),
    ]);
    host.enable(&["a", "b", "c"]).await;

    let report = host
        .manager
        .execute_hook(Hook::AfterIndex, &hook_payload!({ "count" => 3 }))
        .await;

    assert_eq!(callers(&report), vec!["a", "b", "c"]);
    let failed: Vec<&str> = report.failures().map(|(name, _)| name).collect();
    assert_eq!(failed, vec!["b"]);
    let outputs: Vec<&str> = report.outputs().map(|(name, _)| name).collect();
    assert_eq!(outputs, vec!["a", "c"]);

    // The failure is recorded but the plugin stays enabled.
    let info = host.manager.get_plugin_info("b").await.unwrap();
    assert_eq!(info.state, PluginState::Enabled);
    assert!(info.last_error.is_some());
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failure() {
    let host = TestHost::with_config(
        vec![
            subscriber("a", HookBehavior::Record),
            subscriber("b", HookBehavior::Fail),
            subscriber("c", HookBehavior::Record),
        ],
        |config| config.fail_fast_hooks = true,
    );
    host.enable(&["a", "b", "c"]).await;

    let report = host.manager.execute_hook(Hook::AfterIndex, &hook_payload!()).await;

    assert!(report.halted);
    assert_eq!(callers(&report), vec!["a", "b"]);
    assert!(host.journal.matching("hook:after_index:c").is_empty());
}

#[tokio::test]
async fn test_explicit_best_effort_overrides_config() {
    let host = TestHost::with_config(
        vec![subscriber("a", HookBehavior::Fail), subscriber("b", HookBehavior::Record)],
        |config| config.fail_fast_hooks = true,
    );
    host.enable(&["a", "b"]).await;

    let report = host
        .manager
        .execute_hook_with(Hook::AfterIndex, &hook_payload!(), DispatchMode::BestEffort)
        .await;

    assert!(!report.halted);
    assert_eq!(callers(&report), vec!["a", "b"]);
}

#[tokio::test]
async fn test_slow_subscriber_times_out_alone() {
    let host = TestHost::with_config(
        vec![
            subscriber("slow", HookBehavior::Sleep(Duration::from_secs(10))),
            subscriber("fast", HookBehavior::Record),
        ],
        |config| {
            config.timeout_overrides_ms.insert("slow".to_string(), 50);
        },
    );
    host.enable(&["slow", "fast"]).await;

    let started = Instant::now();
    let report = host.manager.execute_hook(Hook::AfterIndex, &hook_payload!()).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    let (name, err) = report.failures().next().expect("slow plugin should fail");
    assert_eq!(name, "slow");
    assert!(err.is_timeout());
    assert_eq!(report.outputs().count(), 1);
}

#[tokio::test]
async fn test_panicking_subscriber_is_isolated() {
    let host = TestHost::new(vec![
        subscriber("boom", HookBehavior::Panic),
        subscriber("calm", HookBehavior::Record),
    ]);
    host.enable(&["boom", "calm"]).await;

    let report = host.manager.execute_hook(Hook::AfterIndex, &hook_payload!()).await;

    let failures: Vec<(&str, &PluginError)> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "boom");
    assert!(matches!(failures[0].1, PluginError::Panicked { .. }));
    assert_eq!(host.journal.matching("hook:after_index:calm").len(), 1);
}

#[tokio::test]
async fn test_disabled_plugins_are_skipped() {
    let host = TestHost::new(vec![
        subscriber("a", HookBehavior::Record),
        subscriber("b", HookBehavior::Record),
    ]);
    host.enable(&["a", "b"]).await;
    host.manager.disable_plugin("a").await.unwrap();

    let report = host.manager.execute_hook(Hook::AfterIndex, &hook_payload!()).await;

    assert_eq!(callers(&report), vec!["b"]);
}

#[tokio::test]
async fn test_lifecycle_hooks_are_scoped_to_one_plugin() {
    let host = TestHost::new(vec![
        Script::new("a").hook(Hook::Startup).hook(Hook::Shutdown),
        Script::new("b").hook(Hook::Startup).hook(Hook::Shutdown),
    ]);
    host.enable(&["a"]).await;
    host.enable(&["b"]).await;
    host.manager.disable_plugin("b").await.unwrap();

    assert_eq!(
        host.journal.matching("hook:"),
        vec!["hook:startup:a:-", "hook:startup:b:-", "hook:shutdown:b:-"]
    );
}

#[tokio::test]
async fn test_duplicate_name_is_rejected() {
    let host = TestHost::new(vec![Script::new("a")]);
    host.load("a").await.unwrap();

    let err = host.load("a").await.unwrap_err();
    assert!(matches!(err, PluginError::AlreadyRegistered { ref name } if name == "a"));
    assert_eq!(host.manager.list_plugins(None).await.len(), 1);
}

#[tokio::test]
async fn test_command_routing() {
    let host = TestHost::new(vec![
        Script::new("indexer").command("reindex"),
        Script::new("rival").command("reindex"),
    ]);
    host.load("indexer").await.unwrap();

    let err = host.load("rival").await.unwrap_err();
    assert!(matches!(
        err,
        PluginError::CommandConflict { ref command, ref owner } if command == "reindex" && owner == "indexer"
    ));
    assert!(!host.manager.registry().contains("rival").await);

    // Registered but not enabled.
    let err = host
        .manager
        .execute_command("reindex", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::InvalidState { .. }));

    host.manager.enable_plugin("indexer").await.unwrap();
    let output = host
        .manager
        .execute_command("reindex", json!({ "full": true }))
        .await
        .unwrap();
    assert_eq!(output["owner"], "indexer");
    assert_eq!(output["args"]["full"], true);
    assert_eq!(host.journal.count("command:reindex:indexer"), 1);

    let err = host
        .manager
        .execute_command("vacuum", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::CommandNotFound { .. }));
}

#[tokio::test]
async fn test_unloading_owner_frees_command() {
    let host = TestHost::new(vec![
        Script::new("indexer").command("reindex"),
        Script::new("rival").command("reindex"),
    ]);
    host.load("indexer").await.unwrap();
    host.manager.unload_plugin("indexer").await.unwrap();

    host.enable(&["rival"]).await;
    let output = host
        .manager
        .execute_command("reindex", json!(null))
        .await
        .unwrap();
    assert_eq!(output["owner"], "rival");
}
