//! Configuration for COMMAX tools.
//!
//! TOML profiles, secret resolution (env var, then secret store, then
//! plaintext) and translation to `commax_core::BridgeConfig`. Nothing in
//! here ever writes a credential to disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use commax_core::{BridgeConfig, Credentials};

/// Keyring service name; entries are `<profile>/<secret>`.
pub const KEYRING_SERVICE: &str = "commax";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no {secret} configured for profile '{profile}'")]
    NoCredentials { profile: String, secret: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named explicitly.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Output format used when `--output` is not given.
    #[serde(default = "default_output")]
    pub output: String,

    /// Color mode used when `--color` is not given.
    #[serde(default = "default_color")]
    pub color: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Polling interval in seconds.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            update_interval: default_update_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_update_interval() -> u64 {
    commax_core::DEFAULT_UPDATE_INTERVAL.as_secs()
}

/// One vendor account / site.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Profile {
    /// Vendor resource (site) number.
    pub resource_no: String,

    pub user_id: String,

    /// Mobile identifier registered with the vendor app.
    pub mobile_uuid: String,

    /// Client secret (plaintext; prefer keyring or env var).
    pub client_secret: Option<String>,

    /// Environment variable holding the client secret.
    pub client_secret_env: Option<String>,

    /// Account password (plaintext; prefer keyring or env var).
    pub user_pass: Option<String>,

    /// Environment variable holding the account password.
    pub user_pass_env: Option<String>,

    /// Override the authorization host.
    pub auth_url: Option<String>,

    /// Override the device/command host.
    pub api_url: Option<String>,

    /// Polling interval override, seconds.
    pub update_interval: Option<u64>,

    /// Request timeout override, seconds.
    pub timeout: Option<u64>,

    /// Delay before the extra poll after a command, milliseconds. 0 disables it.
    pub post_command_refresh_ms: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("net", "commax", "commax").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("commax");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + `COMMAX_` environment variables. A missing file is
/// not an error. Nested keys use `__`, e.g.
/// `COMMAX_PROFILES__HOME__RESOURCE_NO`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("COMMAX_").split("__"));

    Ok(figment.extract()?)
}

impl Config {
    /// Pick the named profile, or the default one.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name, p))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

// ── Secret resolution ───────────────────────────────────────────────

/// Which credential a lookup is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    ClientSecret,
    UserPass,
}

impl SecretKind {
    /// Key suffix used in the secret store.
    pub fn key(self) -> &'static str {
        match self {
            Self::ClientSecret => "client-secret",
            Self::UserPass => "user-pass",
        }
    }
}

/// External store holding credentials outside the config file.
pub trait SecretStore {
    fn get(&self, profile: &str, kind: SecretKind) -> Option<String>;
}

/// OS keyring, entries `commax` / `<profile>/<kind>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringStore;

impl SecretStore for KeyringStore {
    fn get(&self, profile: &str, kind: SecretKind) -> Option<String> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile}/{}", kind.key())).ok()?;
        match entry.get_password() {
            Ok(secret) => Some(secret),
            Err(e) => {
                debug!(profile, secret = kind.key(), error = %e, "keyring lookup missed");
                None
            }
        }
    }
}

/// A secret store with nothing in it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSecretStore;

impl SecretStore for NoSecretStore {
    fn get(&self, _profile: &str, _kind: SecretKind) -> Option<String> {
        None
    }
}

/// Resolve one secret: the profile's `*_env` variable, then the store,
/// then the plaintext value.
pub fn resolve_secret(
    profile: &Profile,
    profile_name: &str,
    kind: SecretKind,
    store: &dyn SecretStore,
) -> Result<SecretString, ConfigError> {
    let (env_name, plaintext) = match kind {
        SecretKind::ClientSecret => (&profile.client_secret_env, &profile.client_secret),
        SecretKind::UserPass => (&profile.user_pass_env, &profile.user_pass),
    };

    // 1. Named env var
    if let Some(env_name) = env_name {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Secret store
    if let Some(secret) = store.get(profile_name, kind) {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(secret) = plaintext {
        return Ok(SecretString::from(secret.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
        secret: kind.key().into(),
    })
}

pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
    store: &dyn SecretStore,
) -> Result<Credentials, ConfigError> {
    require("user_id", &profile.user_id)?;
    require("mobile_uuid", &profile.mobile_uuid)?;

    Ok(Credentials {
        client_secret: resolve_secret(profile, profile_name, SecretKind::ClientSecret, store)?,
        mobile_uuid: profile.mobile_uuid.clone(),
        user_id: profile.user_id.clone(),
        user_pass: resolve_secret(profile, profile_name, SecretKind::UserPass, store)?,
    })
}

fn require(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must not be empty".into(),
        });
    }
    Ok(())
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

// ── BridgeConfig ────────────────────────────────────────────────────

/// Build a `BridgeConfig` from a profile and the global defaults.
pub fn profile_to_bridge_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    store: &dyn SecretStore,
) -> Result<BridgeConfig, ConfigError> {
    require("resource_no", &profile.resource_no)?;
    let credentials = resolve_credentials(profile, profile_name, store)?;

    let mut config = BridgeConfig::new(credentials, profile.resource_no.clone()).map_err(|e| {
        ConfigError::Validation {
            field: "url".into(),
            reason: e.to_string(),
        }
    })?;

    if let Some(ref raw) = profile.auth_url {
        config.auth_url = parse_url("auth_url", raw)?;
    }
    if let Some(ref raw) = profile.api_url {
        config.api_url = parse_url("api_url", raw)?;
    }

    config.update_interval =
        Duration::from_secs(profile.update_interval.unwrap_or(defaults.update_interval));
    config.request_timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    if let Some(ms) = profile.post_command_refresh_ms {
        config.post_command_refresh = (ms > 0).then(|| Duration::from_millis(ms));
    }

    Ok(config)
}
