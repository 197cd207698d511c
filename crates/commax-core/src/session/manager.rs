// ── Authenticated session lifecycle ──
//
// One manager per bridge. The token store sits behind an async mutex and
// every login happens while that mutex is held, so concurrent callers
// that find the session stale queue up behind a single in-flight login
// instead of each starting their own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use commax_api::{AuthorizeRequest, CommaxClient};

use super::{Session, TokenStore};
use crate::config::{Credentials, RetryPolicy};
use crate::error::{ApiError, AuthError};

/// Owns the token store and performs authorized requests.
pub struct AuthSessionManager {
    client: CommaxClient,
    credentials: Credentials,
    margin: Duration,
    retry: RetryPolicy,
    store: Mutex<TokenStore>,
    /// When the current session turns stale; drives the refresh timer.
    refresh_due: watch::Sender<Option<DateTime<Utc>>>,
}

impl AuthSessionManager {
    pub fn new(
        client: CommaxClient,
        credentials: Credentials,
        margin: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let (refresh_due, _) = watch::channel(None);
        Self {
            client,
            credentials,
            margin,
            retry,
            store: Mutex::new(TokenStore::default()),
            refresh_due,
        }
    }

    pub fn client(&self) -> &CommaxClient {
        &self.client
    }

    pub fn refresh_margin(&self) -> Duration {
        self.margin
    }

    /// Copy of the stored session, valid or not.
    pub async fn current_session(&self) -> Option<Session> {
        self.store.lock().await.current().cloned()
    }

    /// Observe when the current session is due for refresh.
    pub fn refresh_schedule(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.refresh_due.subscribe()
    }

    // ── Login ────────────────────────────────────────────────────────

    /// One authorize call with no retry and no side effects on the store.
    pub async fn try_login(&self) -> Result<Session, AuthError> {
        let creds = &self.credentials;
        let request = AuthorizeRequest::password_grant(
            creds.client_secret.expose_secret(),
            &creds.mobile_uuid,
            &creds.user_id,
            creds.user_pass.expose_secret(),
        );

        let issued_at = Utc::now();
        let resp = self
            .client
            .authorize(&request)
            .await
            .map_err(classify_login_error)?;
        Session::from_response(resp, issued_at)
    }

    /// Log in unconditionally and store the new session.
    ///
    /// Transient failures are retried with exponential backoff; a
    /// credential rejection is returned at once and clears the store.
    pub async fn login(&self) -> Result<Session, AuthError> {
        let mut store = self.store.lock().await;
        self.login_into(&mut store).await
    }

    async fn login_with_retry(&self) -> Result<Session, AuthError> {
        let attempts = self.retry.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.try_login().await {
                Ok(session) => {
                    info!(
                        user = %self.credentials.user_id,
                        expires_at = %session.expires_at(),
                        "logged in"
                    );
                    return Ok(session);
                }
                Err(AuthError::NetworkFailure { message }) => {
                    warn!(attempt, max_attempts = attempts, error = %message, "login attempt failed");
                    last_error = message;
                    if attempt < attempts {
                        tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "login rejected");
                    return Err(e);
                }
            }
        }

        Err(AuthError::Unavailable {
            attempts,
            message: last_error,
        })
    }

    /// Log in while holding the store lock and record the result.
    async fn login_into(&self, store: &mut TokenStore) -> Result<Session, AuthError> {
        match self.login_with_retry().await {
            Ok(session) => {
                self.refresh_due
                    .send_replace(Some(session.refresh_at(self.margin)));
                store.replace(session.clone());
                Ok(session)
            }
            Err(e) => {
                if e.needs_reconfiguration() {
                    store.invalidate();
                    self.refresh_due.send_replace(None);
                }
                Err(e)
            }
        }
    }

    /// A valid access token and its generation, logging in if needed.
    async fn ensure_session(&self) -> Result<(SecretString, u64), AuthError> {
        let mut store = self.store.lock().await;
        if let Some(session) = store.valid_at(Utc::now(), self.margin) {
            return Ok((session.access_token().clone(), store.generation()));
        }
        debug!("no valid session, logging in");
        let session = self.login_into(&mut store).await?;
        Ok((session.access_token().clone(), store.generation()))
    }

    /// Replace a session the server just rejected. If another caller has
    /// already replaced it, the newer session is reused.
    async fn reauthenticate(&self, rejected: u64) -> Result<(SecretString, u64), AuthError> {
        let mut store = self.store.lock().await;
        if store.generation() != rejected {
            if let Some(session) = store.valid_at(Utc::now(), self.margin) {
                debug!("session already replaced by a concurrent caller");
                return Ok((session.access_token().clone(), store.generation()));
            }
        }
        store.invalidate_if(rejected);
        let session = self.login_into(&mut store).await?;
        Ok((session.access_token().clone(), store.generation()))
    }

    /// Refresh the session if it is stale. Used by the refresh timer.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let mut store = self.store.lock().await;
        if store.valid_at(Utc::now(), self.margin).is_some() {
            debug!("session still fresh, skipping refresh");
            return Ok(());
        }
        self.login_into(&mut store).await.map(|_| ())
    }

    /// Drop the stored session.
    pub async fn invalidate(&self) {
        self.store.lock().await.invalidate();
        self.refresh_due.send_replace(None);
    }

    // ── Authorized requests ──────────────────────────────────────────

    /// Run `op` with a valid access token.
    ///
    /// A `401` from `op` triggers exactly one re-login and one retry. If
    /// the retry is rejected as well the session is dropped and
    /// `ApiError::Unauthorized(AuthError::Unauthorized)` is returned.
    pub async fn authorized<T, F, Fut>(&self, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut(SecretString) -> Fut,
        Fut: Future<Output = Result<T, commax_api::Error>>,
    {
        let (token, generation) = self.ensure_session().await?;
        match op(token).await {
            Err(e) if e.is_unauthorized() => {}
            other => return other.map_err(ApiError::from),
        }

        warn!("access token rejected, re-authenticating");
        let (token, generation) = self.reauthenticate(generation).await?;
        match op(token).await {
            Err(e) if e.is_unauthorized() => {
                warn!("access token rejected again after re-authentication");
                let mut store = self.store.lock().await;
                if store.invalidate_if(generation) {
                    self.refresh_due.send_replace(None);
                }
                Err(ApiError::Unauthorized(AuthError::Unauthorized))
            }
            other => other.map_err(ApiError::from),
        }
    }

    // ── Refresh timer ────────────────────────────────────────────────

    /// Spawn the background task that refreshes the session shortly
    /// before it goes stale. One per manager; stops on `cancel`.
    pub fn spawn_refresh_timer(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(refresh_timer_task(Arc::clone(self), cancel))
    }
}

impl std::fmt::Debug for AuthSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSessionManager")
            .field("user_id", &self.credentials.user_id)
            .field("margin", &self.margin)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Transport trouble and server-side failures can heal; a malformed
/// endpoint will not, but it is no verdict on the credentials either.
/// Anything else means the vendor looked at the credentials and said no.
fn classify_login_error(err: commax_api::Error) -> AuthError {
    match err {
        commax_api::Error::InvalidUrl(_) => AuthError::Unavailable {
            attempts: 1,
            message: err.to_string(),
        },
        commax_api::Error::Transport(_) | commax_api::Error::Deserialization { .. } => {
            AuthError::NetworkFailure {
                message: err.to_string(),
            }
        }
        commax_api::Error::Status { .. } if err.is_transient() => AuthError::NetworkFailure {
            message: err.to_string(),
        },
        _ => AuthError::InvalidCredentials {
            message: err.to_string(),
        },
    }
}

async fn refresh_timer_task(manager: Arc<AuthSessionManager>, cancel: CancellationToken) {
    let mut due_rx = manager.refresh_schedule();
    // A due time whose refresh already failed. Waits for the next
    // request-driven login instead of retrying in a loop.
    let mut failed_for: Option<DateTime<Utc>> = None;

    loop {
        let due = *due_rx.borrow_and_update();
        let wait = due
            .filter(|at| failed_for != Some(*at))
            .map(|at| (at - Utc::now()).to_std().unwrap_or(Duration::ZERO));

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = due_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = sleep_or_park(wait) => {
                debug!("token refresh timer fired");
                match manager.refresh().await {
                    Ok(()) => failed_for = None,
                    Err(e) => {
                        warn!(error = %e, "scheduled token refresh failed");
                        failed_for = due;
                    }
                }
            }
        }
    }
    debug!("token refresh timer stopped");
}

async fn sleep_or_park(wait: Option<Duration>) {
    match wait {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_errors_are_classified_by_cause() {
        let bad_url = classify_login_error(commax_api::Error::InvalidUrl(
            url::ParseError::RelativeUrlWithoutBase,
        ));
        assert!(matches!(bad_url, AuthError::Unavailable { attempts: 1, .. }));
        assert!(!bad_url.needs_reconfiguration());

        let busy = classify_login_error(commax_api::Error::Status {
            status: 503,
            body: String::new(),
        });
        assert!(matches!(busy, AuthError::NetworkFailure { .. }));

        let garbled = classify_login_error(commax_api::Error::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        });
        assert!(matches!(garbled, AuthError::NetworkFailure { .. }));

        let rejected = classify_login_error(commax_api::Error::ResultCode {
            code: "E1003".into(),
            message: "invalid password".into(),
        });
        assert!(rejected.needs_reconfiguration());

        let forbidden = classify_login_error(commax_api::Error::Status {
            status: 403,
            body: "denied".into(),
        });
        assert!(matches!(forbidden, AuthError::InvalidCredentials { .. }));
    }
}
