// ── Core error types ──
//
// Callers of the bridge never see HTTP status codes or JSON parse
// failures directly. Auth failures, authorized-request failures and
// command failures each get their own enum; `CoreError` wraps them for
// the `Bridge` facade.

use thiserror::Error;

/// Session / credential failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The vendor rejected the credentials. Never retried.
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// A single login attempt failed at the transport level.
    #[error("Network failure during login: {message}")]
    NetworkFailure { message: String },

    /// The token was rejected again right after a fresh login.
    #[error("Unauthorized -- token rejected after re-authentication")]
    Unauthorized,

    /// Login kept failing for transient reasons until retries ran out.
    #[error("Authorization service unavailable after {attempts} attempt(s): {message}")]
    Unavailable { attempts: u32, message: String },
}

impl AuthError {
    /// Credential problems need user action; everything else may heal.
    pub fn needs_reconfiguration(&self) -> bool {
        matches!(self, Self::InvalidCredentials { .. })
    }
}

/// Failures of an authorized request (device list, command submission).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Authentication could not be (re-)established.
    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error("Unexpected result code {code}: {message}")]
    UnexpectedResultCode { code: String, message: String },

    #[error("Malformed response: {message}")]
    Decode { message: String },
}

impl From<commax_api::Error> for ApiError {
    fn from(err: commax_api::Error) -> Self {
        match err {
            commax_api::Error::Transport(e) => Self::Transport {
                message: e.to_string(),
            },
            commax_api::Error::InvalidUrl(e) => Self::Transport {
                message: format!("invalid URL: {e}"),
            },
            commax_api::Error::Unauthorized => Self::Unauthorized(AuthError::Unauthorized),
            commax_api::Error::Status { status, body } => Self::Status {
                status,
                message: body,
            },
            commax_api::Error::ResultCode { code, message } => {
                Self::UnexpectedResultCode { code, message }
            }
            commax_api::Error::Deserialization { message, body: _ } => Self::Decode { message },
        }
    }
}

/// Command validation and submission failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The target does not exist, is read-only, or has a different sort.
    #[error("Invalid command target {device}/{sub}: {reason}")]
    InvalidTarget {
        device: String,
        sub: String,
        reason: String,
    },

    /// The value is outside the sub-device's declared scale/options.
    #[error("Value '{value}' not allowed for {device}/{sub} (allowed: {allowed:?})")]
    ValueNotAllowed {
        device: String,
        sub: String,
        value: String,
        allowed: Vec<String>,
    },

    /// The intent has no mapping for this device category.
    #[error("{intent} is not supported by {category} device {device}")]
    UnsupportedIntent {
        device: String,
        category: String,
        intent: String,
    },

    #[error("Command submission failed: {0}")]
    SubmissionFailed(#[source] ApiError),
}

/// Unified error type for the `Bridge` facade.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Bridge is not connected")]
    Disconnected,

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// The underlying auth failure, whether direct or bubbled through an API call.
    pub fn auth_error(&self) -> Option<&AuthError> {
        match self {
            Self::Auth(e)
            | Self::Api(ApiError::Unauthorized(e))
            | Self::Command(CommandError::SubmissionFailed(ApiError::Unauthorized(e))) => Some(e),
            _ => None,
        }
    }
}
