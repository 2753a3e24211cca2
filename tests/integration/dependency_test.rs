//! Dependency ordering and enforcement.

use docscope_plugin::prelude::*;
use docscope_plugin::{PluginLocator, PluginState};

use crate::helpers::{Script, TestHost};

#[tokio::test]
async fn test_enable_requires_enabled_dependency() {
    let host = TestHost::new(vec![Script::new("a"), Script::new("b").depends_on("a")]);

    // Loading does not need the dependency to be present.
    host.load("b").await.unwrap();
    let err = host.manager.enable_plugin("b").await.unwrap_err();
    assert!(err.is_dependency());
    assert_eq!(host.state("b").await, PluginState::Loaded);

    host.load("a").await.unwrap();
    let err = host.manager.enable_plugin("b").await.unwrap_err();
    assert!(err.is_dependency());

    host.manager.enable_plugin("a").await.unwrap();
    host.manager.enable_plugin("b").await.unwrap();
    assert_eq!(host.state("b").await, PluginState::Enabled);
    assert_eq!(host.journal.events(), vec!["init:a", "init:b"]);
}

#[tokio::test]
async fn test_dependency_cannot_leave_while_dependent_is_enabled() {
    let host = TestHost::new(vec![Script::new("a"), Script::new("b").depends_on("a")]);
    host.enable(&["a", "b"]).await;

    let err = host.manager.disable_plugin("a").await.unwrap_err();
    assert!(err.is_dependency());
    assert_eq!(host.state("a").await, PluginState::Enabled);
    assert_eq!(host.journal.count("shutdown:a"), 0);

    host.manager.disable_plugin("b").await.unwrap();
    host.manager.disable_plugin("a").await.unwrap();
    host.manager.unload_plugin("a").await.unwrap();
}

#[tokio::test]
async fn test_load_all_orders_by_dependency() {
    let host = TestHost::new(vec![
        Script::new("a"),
        Script::new("b").depends_on("a"),
        Script::new("c").depends_on("b"),
    ]);

    let locators: Vec<PluginLocator> = ["c", "b", "a"]
        .into_iter()
        .map(PluginLocator::builtin)
        .collect();
    let results = host.manager.load_all(&locators).await;

    assert!(results.iter().all(|(_, r)| r.is_ok()));
    let loaded: Vec<String> = host
        .manager
        .list_plugins(None)
        .await
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(loaded, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_load_all_excludes_cycles() {
    let host = TestHost::new(vec![
        Script::new("x").depends_on("y"),
        Script::new("y").depends_on("x"),
        Script::new("z"),
    ]);

    let locators: Vec<PluginLocator> = ["x", "y", "z"]
        .into_iter()
        .map(PluginLocator::builtin)
        .collect();
    let results = host.manager.load_all(&locators).await;

    let ok: Vec<&str> = results
        .iter()
        .filter_map(|(_, r)| r.as_deref().ok())
        .collect();
    assert_eq!(ok, vec!["z"]);
    assert_eq!(results.iter().filter(|(_, r)| r.is_err()).count(), 2);
}

#[tokio::test]
async fn test_cycle_through_registered_plugin_is_rejected() {
    let host = TestHost::new(vec![
        Script::new("x").depends_on("y"),
        Script::new("y").depends_on("x"),
    ]);
    host.load("x").await.unwrap();

    let err = host.load("y").await.unwrap_err();
    assert!(matches!(err, PluginError::DependencyCycle { .. }));
    assert!(!host.manager.registry().contains("y").await);
}

#[tokio::test]
async fn test_capability_query_follows_registration_order() {
    let host = TestHost::new(vec![
        Script::new("p2").capability(Capability::Processor),
        Script::new("p1").capability(Capability::Processor),
        Script::new("n").capability(Capability::Notification),
    ]);
    host.load("p2").await.unwrap();
    host.load("n").await.unwrap();
    host.load("p1").await.unwrap();

    let processors: Vec<String> = host
        .manager
        .get_plugins_by_capability(Capability::Processor)
        .await
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(processors, vec!["p2", "p1"]);
}
