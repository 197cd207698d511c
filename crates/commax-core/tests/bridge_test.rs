#![allow(clippy::unwrap_used)]
// Bridge lifecycle and polling scheduler tests against a wiremock vendor.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::Notify;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use commax_api::{CommaxClient, TransportConfig};
use commax_core::{
    AuthSessionManager, Bridge, BridgeState, Command, CoreError, DeviceId, DeviceRegistry, Intent,
    PollingScheduler, RetryPolicy, Sort, SubDeviceId,
};

use common::{
    AUTHORIZE_PATH, COMMAND_PATH, DEVICE_LIST_PATH, RESOURCE_NO, command_ok, config,
    credentials, device_list_ok, mount_login,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn registry(server: &MockServer) -> Arc<DeviceRegistry> {
    let base = Url::parse(&server.uri()).unwrap();
    let client = CommaxClient::new(base.clone(), base, &TransportConfig::default()).unwrap();
    let auth = Arc::new(AuthSessionManager::new(
        client,
        credentials(),
        Duration::from_secs(30 * 60),
        RetryPolicy::default(),
    ));
    Arc::new(DeviceRegistry::new(auth, RESOURCE_NO))
}

/// Scheduler whose only trigger in a test's lifetime is the kick.
fn kicked_scheduler(registry: &Arc<DeviceRegistry>) -> (PollingScheduler, Arc<Notify>) {
    let kick = Arc::new(Notify::new());
    let scheduler = PollingScheduler::new(Arc::clone(registry), Duration::from_secs(3600))
        .with_kick(Arc::clone(&kick), Some(Duration::from_millis(10)));
    (scheduler, kick)
}

async fn count_requests(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}

// ── Bridge lifecycle ────────────────────────────────────────────────

#[tokio::test]
async fn connect_loads_and_publishes_first_snapshot() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0"))
        .expect(1)
        .mount(&server)
        .await;

    let bridge = Bridge::new(config(&server)).unwrap();
    let stream = bridge.subscribe();
    assert_eq!(bridge.state(), BridgeState::Disconnected);

    bridge.connect().await.unwrap();

    assert_eq!(bridge.state(), BridgeState::Connected);
    assert_eq!(bridge.device_list().len(), 4);
    assert_eq!(stream.latest().len(), 4);
    assert_eq!(bridge.configuration().resource_no, RESOURCE_NO);
    assert_eq!(bridge.configuration().update_interval_secs(), 30);

    bridge.disconnect().await;
    assert_eq!(bridge.state(), BridgeState::Disconnected);
    assert!(bridge.session_manager().current_session().await.is_none());
}

#[tokio::test]
async fn connect_with_bad_credentials_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(AUTHORIZE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultCode": "E1003",
            "resultMessage": "invalid password"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let bridge = Bridge::new(config(&server)).unwrap();
    let err = bridge.connect().await.unwrap_err();

    assert!(err.auth_error().is_some_and(|e| e.needs_reconfiguration()));
    assert_eq!(bridge.state(), BridgeState::Failed);
}

#[tokio::test]
async fn commands_require_a_connected_bridge() {
    let server = MockServer::start().await;
    let bridge = Bridge::new(config(&server)).unwrap();

    let err = bridge
        .send_command(Command::new("light-1", "light-1-sw", Sort::SwitchBinary, "1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Disconnected));
}

#[tokio::test]
async fn unknown_device_is_not_found() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0"))
        .mount(&server)
        .await;

    let bridge = Bridge::new(config(&server)).unwrap();
    bridge.connect().await.unwrap();

    let err = bridge
        .send_intent(&DeviceId::from("ghost"), &Intent::TurnOn)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DeviceNotFound { .. }));

    bridge.disconnect().await;
}

#[tokio::test]
async fn accepted_command_triggers_an_early_poll() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(COMMAND_PATH))
        .respond_with(command_ok())
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = config(&server);
    cfg.post_command_refresh = Some(Duration::from_millis(50));
    let bridge = Bridge::new(cfg).unwrap();
    bridge.connect().await.unwrap();

    let light = DeviceId::from("light-1");
    let switch = SubDeviceId::from("light-1-sw");
    bridge.send_intent(&light, &Intent::TurnOn).await.unwrap();
    assert_eq!(bridge.registry().lookup(&light, &switch).unwrap().value, "1");

    tokio::time::sleep(Duration::from_millis(500)).await;

    // The vendor still reports "0"; the early poll restored it.
    assert_eq!(bridge.registry().lookup(&light, &switch).unwrap().value, "0");
    assert_eq!(count_requests(&server, DEVICE_LIST_PATH).await, 2);

    bridge.disconnect().await;
}

#[tokio::test]
async fn oneshot_runs_without_background_tasks() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("1"))
        .expect(1)
        .mount(&server)
        .await;

    let count = Bridge::oneshot(config(&server), |bridge| async move {
        Ok(bridge.device_list().len())
    })
    .await
    .unwrap();
    assert_eq!(count, 4);
}

// ── Polling scheduler ───────────────────────────────────────────────

#[tokio::test]
async fn interval_is_clamped_to_floor() {
    let server = MockServer::start().await;
    let scheduler = PollingScheduler::new(registry(&server), Duration::from_secs(1));
    assert_eq!(scheduler.interval(), Duration::from_secs(5));

    let scheduler = PollingScheduler::new(registry(&server), Duration::from_secs(45));
    assert_eq!(scheduler.interval(), Duration::from_secs(45));
}

#[tokio::test]
async fn poll_failure_does_not_stop_polling() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0"))
        .mount(&server)
        .await;

    let registry = registry(&server);
    let mut stream = registry.subscribe();
    let (scheduler, kick) = kicked_scheduler(&registry);
    scheduler.start().await;

    kick.notify_one();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(registry.current_snapshot().is_empty());

    kick.notify_one();
    let published = tokio::time::timeout(Duration::from_secs(2), stream.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.len(), 4);

    scheduler.stop().await;
}

#[tokio::test]
async fn paused_scheduler_skips_polls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0"))
        .expect(0)
        .mount(&server)
        .await;

    let registry = registry(&server);
    let (scheduler, kick) = kicked_scheduler(&registry);
    scheduler.start().await;

    scheduler.pause();
    assert!(scheduler.is_paused());
    kick.notify_one();
    tokio::time::sleep(Duration::from_millis(200)).await;

    scheduler.stop().await;
    assert!(registry.current_snapshot().is_empty());
}

#[tokio::test]
async fn stop_waits_for_in_flight_refresh() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0").set_delay(Duration::from_millis(400)))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry(&server);
    let (scheduler, kick) = kicked_scheduler(&registry);
    scheduler.start().await;

    kick.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    scheduler.stop().await;

    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(registry.current_snapshot().len(), 4);
}

#[tokio::test]
async fn interval_tick_polls_without_a_kick() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0"))
        .mount(&server)
        .await;

    let registry = registry(&server);
    let mut stream = registry.subscribe();
    let scheduler = PollingScheduler::new(Arc::clone(&registry), Duration::from_secs(1));
    assert_eq!(scheduler.interval(), Duration::from_secs(5));

    let started = Instant::now();
    scheduler.start().await;

    let published = tokio::time::timeout(Duration::from_secs(8), stream.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.len(), 4);
    // The first poll waits one full (clamped) interval.
    assert!(started.elapsed() >= Duration::from_millis(4900));

    scheduler.stop().await;
    assert_eq!(count_requests(&server, DEVICE_LIST_PATH).await, 1);
}

#[tokio::test]
async fn resumed_scheduler_polls_again() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0"))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry(&server);
    let mut stream = registry.subscribe();
    let (scheduler, kick) = kicked_scheduler(&registry);
    scheduler.start().await;

    scheduler.pause();
    kick.notify_one();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count_requests(&server, DEVICE_LIST_PATH).await, 0);

    scheduler.resume();
    assert!(!scheduler.is_paused());
    kick.notify_one();
    let published = tokio::time::timeout(Duration::from_secs(2), stream.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.len(), 4);

    scheduler.stop().await;
}

#[tokio::test]
async fn restarted_scheduler_polls_again() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0"))
        .expect(2)
        .mount(&server)
        .await;

    let registry = registry(&server);
    let mut stream = registry.subscribe();
    let (scheduler, kick) = kicked_scheduler(&registry);

    scheduler.start().await;
    kick.notify_one();
    let first = tokio::time::timeout(Duration::from_secs(2), stream.changed())
        .await
        .unwrap()
        .unwrap();
    scheduler.stop().await;

    scheduler.start().await;
    kick.notify_one();
    let second = tokio::time::timeout(Duration::from_secs(2), stream.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(second.version > first.version);

    scheduler.stop().await;
    assert_eq!(count_requests(&server, DEVICE_LIST_PATH).await, 2);
}
