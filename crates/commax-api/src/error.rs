use thiserror::Error;

/// Top-level error type for the `commax-api` crate.
///
/// Covers transport failures, HTTP status failures and the vendor's
/// in-body `resultCode` rejections. `commax-core` maps these into the
/// auth / api / command taxonomy its callers see.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── HTTP status ─────────────────────────────────────────────────
    /// The bearer token was rejected (HTTP 401).
    #[error("Unauthorized -- access token rejected")]
    Unauthorized,

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    // ── Vendor envelope ─────────────────────────────────────────────
    /// HTTP 200 with a `resultCode` other than `E0000`.
    #[error("Unexpected result code {code}: {message}")]
    ResultCode { code: String, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the server rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// The vendor result code, if the failure came from the envelope.
    pub fn result_code(&self) -> Option<&str> {
        match self {
            Self::ResultCode { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_throttling_are_transient() {
        assert!(
            Error::Status {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            Error::Status {
                status: 429,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !Error::Status {
                status: 400,
                body: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn envelope_rejections_are_not_transient() {
        let err = Error::ResultCode {
            code: "E1001".into(),
            message: "bad password".into(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.result_code(), Some("E1001"));
        assert!(!Error::Unauthorized.is_transient());
        assert!(Error::Unauthorized.is_unauthorized());
    }
}
