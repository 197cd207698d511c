// ── Runtime bridge configuration ──
//
// These types describe *how* to reach the vendor cloud and how often to
// talk to it. They carry credential data but never touch disk: the
// caller (a secret store, `commax-config`, a test) builds a
// `BridgeConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Polling interval used when the caller does not choose one.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(30);
/// Lower bound applied to any configured polling interval.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(5);
/// How long before token expiry the session is considered stale.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(30 * 60);

/// Account credentials for the password grant.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_secret: SecretString,
    pub mobile_uuid: String,
    pub user_id: String,
    pub user_pass: SecretString,
}

/// Bounded exponential backoff for login attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay after the first failure; doubled for every further failure.
    pub base_delay: Duration,
    /// Upper bound on a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the `failures`-th consecutive failure (1-based).
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Configuration for one vendor account / site.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub credentials: Credentials,
    /// Vendor-assigned account/site identifier scoping every call.
    pub resource_no: String,
    /// Authorization host.
    pub auth_url: Url,
    /// Device list / command host.
    pub api_url: Url,
    /// Polling interval (clamped to [`MIN_UPDATE_INTERVAL`] by the scheduler).
    pub update_interval: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Sessions are refreshed this long before they actually expire.
    pub token_refresh_margin: Duration,
    pub login_retry: RetryPolicy,
    /// Extra poll this long after a successful command. `None` = disabled.
    pub post_command_refresh: Option<Duration>,
}

impl BridgeConfig {
    /// Config pointing at the production cloud with default tuning.
    pub fn new(credentials: Credentials, resource_no: impl Into<String>) -> Result<Self, CoreError> {
        Ok(Self {
            credentials,
            resource_no: resource_no.into(),
            auth_url: parse_url(commax_api::DEFAULT_AUTH_URL)?,
            api_url: parse_url(commax_api::DEFAULT_API_URL)?,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            request_timeout: Duration::from_secs(10),
            token_refresh_margin: DEFAULT_REFRESH_MARGIN,
            login_retry: RetryPolicy::default(),
            post_command_refresh: Some(Duration::from_secs(1)),
        })
    }

    /// Point both hosts at one base URL (staging, mock servers).
    pub fn with_base_url(mut self, url: &Url) -> Self {
        self.auth_url = url.clone();
        self.api_url = url.clone();
        self
    }

    /// Polling interval in whole seconds, as exposed to platform layers.
    pub fn update_interval_secs(&self) -> u64 {
        self.update_interval.as_secs()
    }
}

fn parse_url(raw: &str) -> Result<Url, CoreError> {
    Url::parse(raw).map_err(|e| CoreError::Config {
        message: format!("invalid URL {raw}: {e}"),
    })
}
