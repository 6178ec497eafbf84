//! Contract Test: Event Watcher
//!
//! Constraints verified:
//! - A container start event triggers inspection and reconciliation
//! - Irrelevant events are ignored
//! - Service updates are handled only in swarm mode
//! - A broken or closed stream is resubscribed from the last event time
//! - A panic while handling one event does not stop the watcher
//! - The first subscription starts before the initial sync, not after it

mod common;

use common::*;
use companion_core::error::Error;
use companion_core::traits::{EventKind, RuntimeEvent, ServiceInfo};
use companion_core::{Companion, CompanionConfig};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn start(
    config: CompanionConfig,
    provider: &RecordingProvider,
    runtime: &ScriptedRuntime,
) -> (watch::Sender<bool>, JoinHandle<companion_core::Result<()>>) {
    let companion = Companion::new(
        config,
        Arc::new(provider.clone()),
        Some(Arc::new(runtime.clone())),
        None,
    )
    .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    (shutdown_tx, tokio::spawn(companion.run(shutdown_rx)))
}

async fn stop(shutdown_tx: watch::Sender<bool>, handle: JoinHandle<companion_core::Result<()>>) {
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("companion stops after shutdown")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn start_event_triggers_sync() {
    let provider = RecordingProvider::new();
    let runtime = ScriptedRuntime::new();
    let events = runtime.push_stream();

    let (shutdown_tx, handle) = start(minimal_config(), &provider, &runtime);
    assert!(eventually(Duration::from_secs(2), || runtime.subscriptions().len() == 1).await);

    runtime.add_container("c2", rule_labels("late.example.com"));
    events.send(Ok(start_event("c2", unix_now()))).unwrap();

    assert!(
        eventually(Duration::from_secs(2), || {
            provider.created_names() == vec!["late.example.com".to_string()]
        })
        .await
    );

    stop(shutdown_tx, handle).await;
}

#[tokio::test]
async fn irrelevant_events_are_ignored() {
    let provider = RecordingProvider::new();
    let runtime = ScriptedRuntime::new();
    runtime.add_container("c1", rule_labels("app.example.com"));
    let events = runtime.push_stream();

    let mut config = minimal_config();
    config.domains[0] = config.domains[0].clone().with_excluded_sub_domains(["app"]);

    let (shutdown_tx, handle) = start(config, &provider, &runtime);
    assert!(eventually(Duration::from_secs(2), || runtime.subscriptions().len() == 1).await);

    let now = unix_now();
    events
        .send(Ok(RuntimeEvent::new(EventKind::Container, "stop", Some("c1".into()), now)))
        .unwrap();
    events
        .send(Ok(RuntimeEvent::new(EventKind::Container, "start", None, now)))
        .unwrap();
    events
        .send(Ok(RuntimeEvent::new(EventKind::Service, "update", Some("s1".into()), now)))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(provider.list_calls(), 0);

    stop(shutdown_tx, handle).await;
}

#[tokio::test]
async fn service_update_in_swarm_mode() {
    let provider = RecordingProvider::new();
    let runtime = ScriptedRuntime::new();
    let events = runtime.push_stream();

    let mut config = minimal_config();
    config.docker.swarm_mode = true;

    let (shutdown_tx, handle) = start(config, &provider, &runtime);
    assert!(eventually(Duration::from_secs(2), || runtime.subscriptions().len() == 1).await);

    runtime.add_service(ServiceInfo {
        id: "s1".to_string(),
        labels: rule_labels("svc.example.com"),
        container_labels: None,
    });
    events
        .send(Ok(RuntimeEvent::new(
            EventKind::Service,
            "update",
            Some("s1".into()),
            unix_now(),
        )))
        .unwrap();

    assert!(
        eventually(Duration::from_secs(2), || {
            provider.created_names() == vec!["svc.example.com".to_string()]
        })
        .await
    );

    stop(shutdown_tx, handle).await;
}

#[tokio::test]
async fn closed_stream_resubscribes_from_last_event() {
    let provider = RecordingProvider::new();
    let runtime = ScriptedRuntime::new();
    let first = runtime.push_stream();
    let _second = runtime.push_stream();

    let (shutdown_tx, handle) = start(minimal_config(), &provider, &runtime);
    assert!(eventually(Duration::from_secs(2), || runtime.subscriptions().len() == 1).await);

    let later = unix_now() + 100;
    first
        .send(Ok(RuntimeEvent::new(EventKind::Container, "die", Some("c1".into()), later)))
        .unwrap();
    drop(first);

    assert!(eventually(Duration::from_secs(2), || runtime.subscriptions().len() == 2).await);
    assert_eq!(runtime.subscriptions()[1], later);

    stop(shutdown_tx, handle).await;
}

#[tokio::test]
async fn stream_error_backs_off_and_reconnects() {
    let provider = RecordingProvider::new();
    let runtime = ScriptedRuntime::new();
    let first = runtime.push_stream();
    let second = runtime.push_stream();

    let (shutdown_tx, handle) = start(minimal_config(), &provider, &runtime);
    assert!(eventually(Duration::from_secs(2), || runtime.subscriptions().len() == 1).await);

    first.send(Err(Error::runtime("connection reset"))).unwrap();
    assert!(eventually(Duration::from_secs(2), || runtime.subscriptions().len() == 2).await);

    let cursor = runtime.subscriptions()[0];
    assert!(runtime.subscriptions()[1] >= cursor, "cursor never moves backwards");

    runtime.add_container("c3", rule_labels("after.example.com"));
    second.send(Ok(start_event("c3", unix_now()))).unwrap();

    assert!(
        eventually(Duration::from_secs(2), || {
            provider.created_names() == vec!["after.example.com".to_string()]
        })
        .await
    );

    stop(shutdown_tx, handle).await;
}

#[tokio::test]
async fn panicking_event_does_not_stop_watcher() {
    let provider = RecordingProvider::new();
    let runtime = ScriptedRuntime::new();
    runtime.add_panicking_container("boom");
    let events = runtime.push_stream();

    let (shutdown_tx, handle) = start(minimal_config(), &provider, &runtime);
    assert!(eventually(Duration::from_secs(2), || runtime.subscriptions().len() == 1).await);

    events.send(Ok(start_event("boom", unix_now()))).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    runtime.add_container("ok", rule_labels("ok.example.com"));
    events.send(Ok(start_event("ok", unix_now()))).unwrap();

    assert!(
        eventually(Duration::from_secs(2), || {
            provider.created_names() == vec!["ok.example.com".to_string()]
        })
        .await
    );
    assert_eq!(runtime.subscriptions().len(), 1, "stream was not restarted");

    stop(shutdown_tx, handle).await;
}

#[tokio::test]
async fn subscription_covers_initial_sync() {
    let provider = RecordingProvider::new();
    provider.slow_lists(Duration::from_millis(2100));
    let runtime = ScriptedRuntime::new();
    runtime.add_container("c1", rule_labels("app.example.com"));
    let _events = runtime.push_stream();

    let before = unix_now();
    let (shutdown_tx, handle) = start(minimal_config(), &provider, &runtime);
    assert!(eventually(Duration::from_secs(5), || runtime.subscriptions().len() == 1).await);

    assert!(unix_now() >= before + 2);
    assert!(
        runtime.subscriptions()[0] <= before + 1,
        "subscription since {} should predate the initial sync started at {}",
        runtime.subscriptions()[0],
        before
    );

    stop(shutdown_tx, handle).await;
}
