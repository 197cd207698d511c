#![allow(clippy::unwrap_used)]
// DeviceRegistry tests against a wiremock vendor.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use commax_api::{CommaxClient, TransportConfig};
use commax_core::{
    Access, ApiError, AuthSessionManager, DeviceCategory, DeviceId, DeviceRegistry, RetryPolicy,
    Sort, SubDeviceId,
};

use common::{DEVICE_LIST_PATH, RESOURCE_NO, credentials, device_list_ok, mount_login};

fn registry(server: &MockServer) -> DeviceRegistry {
    let base = Url::parse(&server.uri()).unwrap();
    let client = CommaxClient::new(base.clone(), base, &TransportConfig::default()).unwrap();
    let auth = Arc::new(AuthSessionManager::new(
        client,
        credentials(),
        Duration::from_secs(30 * 60),
        RetryPolicy::default(),
    ));
    DeviceRegistry::new(auth, RESOURCE_NO)
}

#[tokio::test]
async fn refresh_builds_snapshot_in_vendor_order() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .and(query_param("resourceNo", RESOURCE_NO))
        .respond_with(device_list_ok("0"))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry(&server);
    let snapshot = registry.refresh().await.unwrap();

    let ids: Vec<&str> = snapshot.devices().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["light-1", "boiler-1", "fan-1", "valve-1"]);
    assert!(snapshot.version > 0);

    let valve = snapshot.device(&DeviceId::from("valve-1")).unwrap();
    assert_eq!(valve.category, DeviceCategory::Unknown("gasValve".into()));

    let counts = snapshot.category_counts();
    assert_eq!(counts.get("light"), Some(&1));
    assert_eq!(counts.get("gasValve"), Some(&1));
}

#[tokio::test]
async fn lookup_reads_the_current_snapshot() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0"))
        .mount(&server)
        .await;

    let registry = registry(&server);
    let boiler = DeviceId::from("boiler-1");
    assert!(registry.lookup(&boiler, &SubDeviceId::from("boiler-1-cur")).is_none());

    registry.refresh().await.unwrap();

    // Numeric JSON values stay opaque strings.
    let current = registry
        .lookup(&boiler, &SubDeviceId::from("boiler-1-cur"))
        .unwrap();
    assert_eq!(current.sort, Sort::AirTemperature);
    assert_eq!(current.access, Access::Read);
    assert_eq!(current.value, "21.5");

    let mode = registry
        .lookup(&DeviceId::from("fan-1"), &SubDeviceId::from("fan-1-mode"))
        .unwrap();
    assert_eq!(mode.scale, vec!["0", "1", "2"]);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let registry = registry(&server);
    let first = registry.refresh().await.unwrap();

    let err = registry.refresh().await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 500, .. }));

    let current = registry.current_snapshot();
    assert_eq!(current.version, first.version);
    assert_eq!(current.len(), 4);
}

#[tokio::test]
async fn unexpected_result_code_is_reported() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultCode": "E2001",
            "resultMessage": "unknown resource"
        })))
        .mount(&server)
        .await;

    let err = registry(&server).refresh().await.unwrap_err();
    assert_eq!(
        err,
        ApiError::UnexpectedResultCode {
            code: "E2001".into(),
            message: "unknown resource".into(),
        }
    );
}

#[tokio::test]
async fn subscribers_only_see_published_snapshots() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0"))
        .mount(&server)
        .await;

    let registry = registry(&server);
    let mut stream = registry.subscribe();
    assert!(stream.current().is_empty());

    let first = registry.refresh().await.unwrap();
    assert!(stream.latest().is_empty());

    registry.publish();
    let seen = tokio::time::timeout(Duration::from_secs(1), stream.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen.version, first.version);

    let second = registry.refresh().await.unwrap();
    assert!(second.version > first.version);
}

#[tokio::test]
async fn snapshot_stream_yields_current_then_published() {
    use futures_util::StreamExt;

    let server = MockServer::start().await;
    mount_login(&server, "tok-1", 1).await;
    Mock::given(method("GET"))
        .and(path(DEVICE_LIST_PATH))
        .respond_with(device_list_ok("0"))
        .mount(&server)
        .await;

    let registry = registry(&server);
    let mut stream = registry.subscribe().into_stream();

    let initial = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert!(initial.is_empty());

    let refreshed = registry.refresh().await.unwrap();
    registry.publish();
    let next = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.version, refreshed.version);
    assert_eq!(next.len(), 4);

    drop(registry);
    let ended = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap();
    assert!(ended.is_none());
}
