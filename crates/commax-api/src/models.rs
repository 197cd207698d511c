// Wire models for the COMMAX IoT cloud API
//
// Field names follow the vendor's camelCase JSON. Device and sub-device
// fields are all optional on the way in: the cloud omits keys freely and
// a single malformed entry must not fail the whole device list.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `resultCode` value the vendor uses for success.
pub const SUCCESS_CODE: &str = "E0000";

pub(crate) const CLIENT_ID: &str = "APP-IOS-com.commax.iphomeiot";
pub(crate) const OS_CODE: &str = "IOS";
pub(crate) const GRANT_TYPE: &str = "password";

// ── Authorize ────────────────────────────────────────────────────────

/// Body of `POST /v2/oauth/user/authorize`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    client_secret: String,
    user: AuthorizeUser,
    client_id: String,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeUser {
    mobile_uuid: String,
    os_code: String,
    grant_type: String,
    user_pass: String,
    user_id: String,
    password: String,
}

impl AuthorizeRequest {
    /// Build a password-grant request. The `password` field carries the
    /// percent-encoded form of `user_pass`; `userPass` carries it raw.
    pub fn password_grant(
        client_secret: &str,
        mobile_uuid: &str,
        user_id: &str,
        user_pass: &str,
    ) -> Self {
        Self {
            client_secret: client_secret.to_owned(),
            user: AuthorizeUser {
                mobile_uuid: mobile_uuid.to_owned(),
                os_code: OS_CODE.to_owned(),
                grant_type: GRANT_TYPE.to_owned(),
                user_pass: user_pass.to_owned(),
                user_id: user_id.to_owned(),
                password: obfuscate_password(user_pass),
            },
            client_id: CLIENT_ID.to_owned(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user.user_id
    }
}

impl fmt::Debug for AuthorizeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizeRequest")
            .field("client_id", &self.client_id)
            .field("user_id", &self.user.user_id)
            .field("mobile_uuid", &self.user.mobile_uuid)
            .finish_non_exhaustive()
    }
}

/// Percent-encode a password the way the vendor app does: unreserved
/// characters and `/` pass through, everything else is `%XX`.
pub(crate) fn obfuscate_password(raw: &str) -> String {
    urlencoding::encode(raw).replace("%2F", "/")
}

/// Response of the authorize endpoint.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub result_code: String,
    #[serde(default)]
    pub result_message: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub expire_in: Option<u64>,
}

impl fmt::Debug for AuthorizeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizeResponse")
            .field("result_code", &self.result_code)
            .field("result_message", &self.result_message)
            .field("token_type", &self.token_type)
            .field("expire_in", &self.expire_in)
            .finish_non_exhaustive()
    }
}

// ── Device list ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeviceListResponse {
    pub result_code: String,
    #[serde(default)]
    pub result_message: Option<String>,
    #[serde(default)]
    pub resource: Option<DeviceListResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceListResource {
    #[serde(default)]
    pub devices: Option<DeviceObjects>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceObjects {
    #[serde(default)]
    pub object: Vec<RawDevice>,
}

/// One entry of `resource.devices.object[]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDevice {
    #[serde(default)]
    pub root_uuid: Option<String>,
    #[serde(default)]
    pub commax_device: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    /// Vendor device kind (e.g. `"switch"`), echoed back on commands.
    #[serde(default)]
    pub root_device: Option<String>,
    #[serde(default)]
    pub sub_device: Vec<RawSubDevice>,
}

/// One entry of a device's `subDevice[]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubDevice {
    #[serde(default)]
    pub sub_uuid: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    /// `read` or `readWrite`.
    #[serde(default, rename = "type")]
    pub access: Option<String>,
    #[serde(default, deserialize_with = "opaque_string")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "opaque_string_list")]
    pub scale: Vec<String>,
    #[serde(default, deserialize_with = "opaque_string_list")]
    pub option: Vec<String>,
}

/// Accept a JSON string, number or bool and keep it as its textual form.
fn opaque_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_string))
}

fn opaque_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.into_iter().filter_map(value_to_string).collect(),
        Some(other) => value_to_string(other).into_iter().collect(),
        None => Vec::new(),
    })
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

// ── Command ──────────────────────────────────────────────────────────

/// Body of `POST /v2/command`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRequest {
    commands: CgpCommands,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct CgpCommands {
    #[serde(rename = "cgpCommand")]
    cgp_command: Vec<CgpCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct CgpCommand {
    cgp: Cgp,
    resource_no: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Cgp {
    command: String,
    object: DeviceObject,
}

impl CommandRequest {
    /// Wrap one `set` command per device object, all scoped to `resource_no`.
    pub fn set(resource_no: &str, objects: Vec<DeviceObject>) -> Self {
        Self {
            commands: CgpCommands {
                cgp_command: objects
                    .into_iter()
                    .map(|object| CgpCommand {
                        cgp: Cgp {
                            command: "set".into(),
                            object,
                        },
                        resource_no: resource_no.to_owned(),
                    })
                    .collect(),
            },
        }
    }

    /// Number of `cgpCommand` entries.
    pub fn len(&self) -> usize {
        self.commands.cgp_command.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.cgp_command.is_empty()
    }
}

/// The device being mutated and the sub-device changes to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceObject {
    pub sub_device: Vec<SubDeviceCommand>,
    pub root_uuid: String,
    pub nickname: Option<String>,
    pub root_device: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubDeviceCommand {
    pub value: String,
    pub func_command: String,
    #[serde(rename = "type")]
    pub access: String,
    pub sub_uuid: String,
    pub sort: String,
}

impl SubDeviceCommand {
    pub fn set(sub_uuid: &str, sort: &str, value: &str) -> Self {
        Self {
            value: value.to_owned(),
            func_command: "set".into(),
            access: "readWrite".into(),
            sub_uuid: sub_uuid.to_owned(),
            sort: sort.to_owned(),
        }
    }
}

/// Response of the command endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub result_code: String,
    #[serde(default)]
    pub result_message: Option<String>,
}
