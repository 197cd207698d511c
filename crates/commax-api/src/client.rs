// COMMAX IoT HTTP client
//
// Wraps `reqwest::Client` with vendor URL construction and envelope
// checking. Auth and device/command traffic live on different hosts,
// so the client carries two base URLs.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{
    AuthorizeRequest, AuthorizeResponse, CommandRequest, CommandResponse, DeviceListResponse,
    RawDevice, SUCCESS_CODE,
};
use crate::transport::TransportConfig;

/// Production authorization host.
pub const DEFAULT_AUTH_URL: &str = "https://gauth-v2.commaxcloud.net";
/// Production device/command host.
pub const DEFAULT_API_URL: &str = "https://iot-v2.commaxcloud.net:443";

const AUTHORIZE_PATH: &str = "/v2/oauth/user/authorize";
const DEVICE_LIST_PATH: &str = "/v2/resource/device/list";
const COMMAND_PATH: &str = "/v2/command";

/// Raw HTTP client for the COMMAX IoT cloud.
///
/// Stateless apart from the connection pool: every authorized call takes
/// the bearer token as an argument. A `401` surfaces as
/// [`Error::Unauthorized`] so the session layer can re-authenticate.
#[derive(Debug, Clone)]
pub struct CommaxClient {
    http: reqwest::Client,
    auth_url: Url,
    api_url: Url,
}

impl CommaxClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(auth_url: Url, api_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, auth_url, api_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, auth_url: Url, api_url: Url) -> Self {
        Self {
            http,
            auth_url,
            api_url,
        }
    }

    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `POST /v2/oauth/user/authorize`.
    ///
    /// Returns the response only when `resultCode == "E0000"`; any other
    /// code becomes [`Error::ResultCode`].
    pub async fn authorize(&self, request: &AuthorizeRequest) -> Result<AuthorizeResponse, Error> {
        let url = endpoint(&self.auth_url, AUTHORIZE_PATH)?;
        debug!(user = request.user_id(), "POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(Error::Transport)?;

        let body: AuthorizeResponse = parse_json(resp).await?;
        check_result_code(&body.result_code, body.result_message.as_deref())?;
        Ok(body)
    }

    /// `GET /v2/resource/device/list?resourceNo={resource_no}`.
    ///
    /// Strips the `resource.devices.object` nesting; a missing path is an
    /// empty list, not an error.
    pub async fn device_list(
        &self,
        token: &SecretString,
        resource_no: &str,
    ) -> Result<Vec<RawDevice>, Error> {
        let mut url = endpoint(&self.api_url, DEVICE_LIST_PATH)?;
        url.query_pairs_mut().append_pair("resourceNo", resource_no);
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(Error::Transport)?;

        let body: DeviceListResponse = parse_json(resp).await?;
        check_result_code(&body.result_code, body.result_message.as_deref())?;

        let devices = body
            .resource
            .and_then(|r| r.devices)
            .map(|d| d.object)
            .unwrap_or_default();
        trace!(count = devices.len(), "device list received");
        Ok(devices)
    }

    /// `POST /v2/command`.
    pub async fn send_command(
        &self,
        token: &SecretString,
        request: &CommandRequest,
    ) -> Result<CommandResponse, Error> {
        let url = endpoint(&self.api_url, COMMAND_PATH)?;
        debug!(entries = request.len(), "POST {}", url);

        let resp = self.post_authorized(url, token, request).await?;
        let body: CommandResponse = parse_json(resp).await?;
        check_result_code(&body.result_code, body.result_message.as_deref())?;
        Ok(body)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn post_authorized(
        &self,
        url: Url,
        token: &SecretString,
        body: &(impl Serialize + Sync),
    ) -> Result<reqwest::Response, Error> {
        self.http
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)
    }
}

/// Join an absolute endpoint path onto a base URL, keeping any port.
fn endpoint(base: &Url, path: &str) -> Result<Url, Error> {
    let base = base.as_str().trim_end_matches('/');
    Url::parse(&format!("{base}{path}")).map_err(Error::InvalidUrl)
}

/// Map HTTP status to [`Error`] and decode the JSON body.
async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized);
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Status {
            status: status.as_u16(),
            body: preview(&body).to_owned(),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body: body.clone(),
    })
}

fn check_result_code(code: &str, message: Option<&str>) -> Result<(), Error> {
    if code == SUCCESS_CODE {
        return Ok(());
    }
    Err(Error::ResultCode {
        code: code.to_owned(),
        message: message.unwrap_or_default().to_owned(),
    })
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_port_and_trims_slash() {
        let base = Url::parse("https://iot-v2.commaxcloud.net:8443/").unwrap();
        let url = endpoint(&base, COMMAND_PATH).unwrap();
        assert_eq!(url.as_str(), "https://iot-v2.commaxcloud.net:8443/v2/command");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "가".repeat(100);
        let p = preview(&body);
        assert!(p.len() <= 200);
        assert!(body.starts_with(p));
    }

    #[test]
    fn result_code_check() {
        assert!(check_result_code("E0000", None).is_ok());
        let err = check_result_code("E2001", Some("expired")).unwrap_err();
        assert!(matches!(err, Error::ResultCode { ref code, .. } if code == "E2001"));
    }
}
