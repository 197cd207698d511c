#![allow(dead_code, clippy::unwrap_used)]
// Shared fixtures for the commax-core integration tests.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use commax_core::{BridgeConfig, Credentials, RetryPolicy};

pub const RESOURCE_NO: &str = "R-100";
pub const AUTHORIZE_PATH: &str = "/v2/oauth/user/authorize";
pub const DEVICE_LIST_PATH: &str = "/v2/resource/device/list";
pub const COMMAND_PATH: &str = "/v2/command";

pub fn credentials() -> Credentials {
    Credentials {
        client_secret: SecretString::from("client-secret".to_owned()),
        mobile_uuid: "mobile-1".into(),
        user_id: "alice".into(),
        user_pass: SecretString::from("p@ss/word".to_owned()),
    }
}

/// Config pointed at `server` with fast retries and no post-command poll.
pub fn config(server: &MockServer) -> BridgeConfig {
    let base = Url::parse(&server.uri()).unwrap();
    let mut config = BridgeConfig::new(credentials(), RESOURCE_NO)
        .unwrap()
        .with_base_url(&base);
    config.login_retry = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    };
    config.request_timeout = Duration::from_secs(5);
    config.post_command_refresh = None;
    config
}

pub fn login_body(token: &str, expire_in: u64) -> Value {
    json!({
        "resultCode": "E0000",
        "resultMessage": "success",
        "accessToken": token,
        "tokenType": "Bearer",
        "refreshToken": format!("refresh-{token}"),
        "expireIn": expire_in
    })
}

pub fn login_ok(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(login_body(token, 3600))
}

/// Mount a login that always succeeds with `token`, expecting `calls` hits.
pub async fn mount_login(server: &MockServer, token: &str, calls: u64) {
    Mock::given(method("POST"))
        .and(path(AUTHORIZE_PATH))
        .respond_with(login_ok(token))
        .expect(calls)
        .mount(server)
        .await;
}

/// One light, one boiler, one fan and one unrecognized device.
pub fn devices_fixture(light_value: &str) -> Value {
    json!([
        {
            "rootUuid": "light-1",
            "commaxDevice": "light",
            "nickname": "Kitchen",
            "rootDevice": "switch",
            "subDevice": [
                { "subUuid": "light-1-sw", "sort": "switchBinary", "type": "readWrite", "value": light_value }
            ]
        },
        {
            "rootUuid": "boiler-1",
            "commaxDevice": "boiler",
            "nickname": "Living room",
            "rootDevice": "thermostat",
            "subDevice": [
                { "subUuid": "boiler-1-mode", "sort": "thermostatMode", "type": "readWrite", "value": "0" },
                { "subUuid": "boiler-1-cur", "sort": "airTemperature", "type": "read", "value": 21.5 },
                { "subUuid": "boiler-1-set", "sort": "thermostatSetpoint", "type": "readWrite", "value": "22" }
            ]
        },
        {
            "rootUuid": "fan-1",
            "commaxDevice": "fanSystem",
            "nickname": "Ventilation",
            "rootDevice": "fan",
            "subDevice": [
                { "subUuid": "fan-1-sw", "sort": "switchBinary", "type": "readWrite", "value": "0" },
                { "subUuid": "fan-1-mode", "sort": "fanMode", "type": "readWrite", "value": "1", "scale": ["0", "1", "2"] }
            ]
        },
        {
            "rootUuid": "valve-1",
            "commaxDevice": "gasValve",
            "subDevice": [
                { "subUuid": "valve-1-sw", "sort": "switchBinary", "type": "readWrite", "value": "1" }
            ]
        }
    ])
}

pub fn device_list_body(devices: Value) -> Value {
    json!({
        "resultCode": "E0000",
        "resultMessage": "success",
        "resource": { "devices": { "object": devices } }
    })
}

pub fn device_list_ok(light_value: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(device_list_body(devices_fixture(light_value)))
}

pub fn command_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "resultCode": "E0000",
        "resultMessage": "success"
    }))
}
