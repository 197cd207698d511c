// ── Session state ──
//
// `Session` is one issued token pair; `TokenStore` holds at most one of
// them plus a generation counter so a caller that saw a token rejected
// can tell whether someone else has already replaced it.

mod manager;

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;

use commax_api::AuthorizeResponse;

use crate::error::AuthError;

pub use manager::AuthSessionManager;

/// Lifetime assumed when the vendor omits `expireIn`.
const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(3600);

/// An issued access token and its lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    token_type: String,
    issued_at: DateTime<Utc>,
    expires_in: Duration,
}

impl Session {
    pub fn new(access_token: SecretString, issued_at: DateTime<Utc>, expires_in: Duration) -> Self {
        Self {
            access_token,
            refresh_token: None,
            token_type: "Bearer".into(),
            issued_at,
            expires_in: if expires_in.is_zero() {
                DEFAULT_EXPIRES_IN
            } else {
                expires_in
            },
        }
    }

    /// Build from a successful authorize response issued at `issued_at`.
    pub(crate) fn from_response(
        resp: AuthorizeResponse,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, AuthError> {
        let access_token = resp
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidCredentials {
                message: "authorize response carried no access token".into(),
            })?;

        let mut session = Self::new(
            SecretString::from(access_token),
            issued_at,
            Duration::from_secs(resp.expire_in.unwrap_or_default()),
        );
        session.refresh_token = resp.refresh_token.map(SecretString::from);
        if let Some(token_type) = resp.token_type {
            session.token_type = token_type;
        }
        Ok(session)
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        add(self.issued_at, self.expires_in)
    }

    /// When this session turns stale. Always strictly before
    /// [`expires_at`](Self::expires_at): a margin that does not fit in the
    /// lifetime shrinks to half the lifetime.
    pub fn refresh_at(&self, margin: Duration) -> DateTime<Utc> {
        let margin = if margin < self.expires_in {
            margin
        } else {
            self.expires_in / 2
        };
        add(self.issued_at, self.expires_in - margin)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now < self.refresh_at(margin)
    }
}

fn add(at: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(d)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Holder of the current session. No behavior beyond validity checks.
#[derive(Debug, Default)]
pub struct TokenStore {
    session: Option<Session>,
    generation: u64,
}

impl TokenStore {
    pub fn current(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The current session if it is still valid at `now`.
    pub fn valid_at(&self, now: DateTime<Utc>, margin: Duration) -> Option<&Session> {
        self.session.as_ref().filter(|s| s.is_valid_at(now, margin))
    }

    /// Bumped every time a session is stored.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Store a new session, returning its generation.
    pub fn replace(&mut self, session: Session) -> u64 {
        self.generation += 1;
        self.session = Some(session);
        self.generation
    }

    pub fn invalidate(&mut self) {
        self.session = None;
    }

    /// Drop the session only if it is still the one issued as `generation`.
    pub fn invalidate_if(&mut self, generation: u64) -> bool {
        if self.generation == generation && self.session.is_some() {
            self.session = None;
            return true;
        }
        false
    }
}
