//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use commax_config::ConfigError;
use commax_core::{ApiError, AuthError, CommandError, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the COMMAX cloud: {message}")]
    #[diagnostic(
        code(commax::connection_failed),
        help(
            "Check network access to the auth and API hosts.\n\
             Override them per profile with auth_url / api_url."
        )
    )]
    ConnectionFailed { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(commax::auth_failed),
        help(
            "Verify user_id, mobile_uuid, client secret and password for this profile.\n\
             Secrets resolve from the *_env variable, then the keyring, then the file."
        )
    )]
    AuthFailed { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(commax::not_found),
        help("Run: commax devices list to see available devices")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    // ── Commands ─────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(commax::command_rejected),
        help("Run: commax devices get <device> to see writable sub-devices and their values")
    )]
    Command(CommandError),

    #[error("API error: {0}")]
    #[diagnostic(code(commax::api_error))]
    Api(ApiError),

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(commax::profile_not_found),
        help(
            "Add a [profiles.{name}] table to {path}\n\
             or pick another profile with --profile."
        )
    )]
    ProfileNotFound { name: String, path: String },

    #[error(transparent)]
    #[diagnostic(code(commax::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::ProfileNotFound { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Command(_) | Self::Api(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<AuthError> for CliError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NetworkFailure { message } | AuthError::Unavailable { message, .. } => {
                Self::ConnectionFailed { message }
            }
            other => Self::AuthFailed {
                message: other.to_string(),
            },
        }
    }
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(auth) => auth.into(),
            ApiError::Transport { message } => Self::ConnectionFailed { message },
            ApiError::Status { status, message } if status >= 500 => Self::ConnectionFailed {
                message: format!("HTTP {status}: {message}"),
            },
            other => Self::Api(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Auth(e) => e.into(),
            CoreError::Api(e) | CoreError::Command(CommandError::SubmissionFailed(e)) => e.into(),
            CoreError::Command(e) => Self::Command(e),
            CoreError::DeviceNotFound { identifier } => Self::NotFound {
                resource_type: "device".into(),
                identifier,
            },
            CoreError::Disconnected => Self::ConnectionFailed {
                message: "bridge is not connected".into(),
            },
            CoreError::Config { message } => Self::Config(ConfigError::Validation {
                field: "config".into(),
                reason: message,
            }),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                path: commax_config::config_path().display().to_string(),
            },
            other => Self::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        let auth: CliError = CoreError::Auth(AuthError::InvalidCredentials {
            message: "bad".into(),
        })
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let unavailable: CliError = CoreError::Auth(AuthError::Unavailable {
            attempts: 3,
            message: "503".into(),
        })
        .into();
        assert_eq!(unavailable.exit_code(), exit_code::CONNECTION);

        let missing: CliError = CoreError::DeviceNotFound {
            identifier: "ghost".into(),
        }
        .into();
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let profile: CliError = ConfigError::UnknownProfile {
            profile: "home".into(),
        }
        .into();
        assert_eq!(profile.exit_code(), exit_code::CONFIG);
    }

    #[test]
    fn rejected_token_inside_a_command_is_an_auth_failure() {
        let err: CliError = CoreError::Command(CommandError::SubmissionFailed(
            ApiError::Unauthorized(AuthError::Unauthorized),
        ))
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);

        let invalid: CliError = CoreError::Command(CommandError::InvalidTarget {
            device: "d".into(),
            sub: "s".into(),
            reason: "read-only".into(),
        })
        .into();
        assert_eq!(invalid.exit_code(), exit_code::GENERAL);
    }
}
