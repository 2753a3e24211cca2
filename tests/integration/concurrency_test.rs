//! Lifecycle changes and dispatch racing each other on a multi-threaded
//! runtime.

use std::sync::Arc;
use std::time::Duration;

use docscope_plugin::prelude::*;
use docscope_plugin::PluginState;

use crate::helpers::{Script, TestHost};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dependent_is_never_enabled_without_its_dependency() {
    let host = Arc::new(TestHost::new(vec![
        Script::new("a"),
        Script::new("b")
            .depends_on("a")
            .slow_init(Duration::from_millis(1)),
    ]));
    host.load("a").await.unwrap();
    host.load("b").await.unwrap();

    for _ in 0..50 {
        host.manager.enable_plugin("a").await.unwrap();

        let enable_b = tokio::spawn({
            let host = host.clone();
            async move { host.manager.enable_plugin("b").await }
        });
        let disable_a = tokio::spawn({
            let host = host.clone();
            async move { host.manager.disable_plugin("a").await }
        });
        let enabled = enable_b.await.unwrap();
        let disabled = disable_a.await.unwrap();

        let a = host.state("a").await;
        let b = host.state("b").await;
        if b == PluginState::Enabled {
            assert_eq!(a, PluginState::Enabled);
            assert!(enabled.is_ok());
            assert!(disabled.unwrap_err().is_dependency());
            host.manager.disable_plugin("b").await.unwrap();
        } else {
            assert_eq!(a, PluginState::Disabled);
            assert!(disabled.is_ok());
            assert!(enabled.unwrap_err().is_dependency());
        }
    }

    // Every successful start of b was matched by a shutdown.
    assert_eq!(
        host.journal.count("init:b"),
        host.journal.count("shutdown:b")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispatch_during_enable_sees_a_consistent_subscriber_set() {
    let host = Arc::new(TestHost::new(vec![
        Script::new("early").hook(Hook::AfterIndex),
        Script::new("late")
            .hook(Hook::AfterIndex)
            .slow_init(Duration::from_millis(20)),
    ]));
    host.enable(&["early"]).await;
    host.load("late").await.unwrap();

    let enabling = tokio::spawn({
        let host = host.clone();
        async move { host.manager.enable_plugin("late").await }
    });

    let payload = hook_payload!({ "count" => 1 });
    let mut saw_late = false;
    loop {
        let finished = enabling.is_finished();
        let report = host.manager.execute_hook(Hook::AfterIndex, &payload).await;
        let callers: Vec<&str> = report.invocations.iter().map(|i| i.plugin.as_str()).collect();
        if saw_late {
            assert_eq!(callers, vec!["early", "late"]);
        } else {
            assert!(callers == ["early"] || callers == ["early", "late"], "{callers:?}");
            saw_late = callers.len() == 2;
        }
        assert_eq!(report.failures().count(), 0);
        if finished {
            break;
        }
        tokio::task::yield_now().await;
    }
    enabling.await.unwrap().unwrap();
    assert!(saw_late);

    // No hook reached `late` before its initialize completed.
    let events = host.journal.events();
    let init = events.iter().position(|e| e == "init:late").unwrap();
    let first_hook = events
        .iter()
        .position(|e| e.starts_with("hook:") && e.contains(":late:"))
        .unwrap();
    assert!(init < first_hook);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_register_once() {
    let host = Arc::new(TestHost::new(vec![Script::new("a")]));

    let loads: Vec<_> = (0..8)
        .map(|_| {
            let host = host.clone();
            tokio::spawn(async move { host.load("a").await })
        })
        .collect();
    let mut loaded = 0;
    for load in loads {
        match load.await.unwrap() {
            Ok(_) => loaded += 1,
            Err(e) => assert!(matches!(e, PluginError::AlreadyRegistered { .. })),
        }
    }

    assert_eq!(loaded, 1);
    assert_eq!(host.manager.status().await.total, 1);
}
