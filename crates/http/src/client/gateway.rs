//! Authenticated request gateway
//!
//! Every request leaves through [`AuthGateway::send`], which attaches the
//! stored access token as a bearer credential. A `401 Unauthorized` answer
//! starts the refresh protocol:
//!
//! - at most one refresh exchange runs at a time; requests denied while one
//!   is in flight wait on a one-shot channel instead of starting another;
//! - on success the new token is persisted before any waiter resumes, and
//!   every waiter plus the initiator replays its request once;
//! - on failure all credentials are cleared, every waiter fails without
//!   replaying, and the session-expired hook runs.
//!
//! A request is replayed at most once; the replay is sent without further
//! interception.
//!
//! Each settled exchange bumps a generation counter. A request remembers the
//! generation it was sent under; if its 401 arrives after a later exchange
//! settled, it takes that exchange's outcome instead of starting another.
//! The decision between reusing an outcome, waiting, and initiating is made
//! under one lock.

use super::credentials::CredentialStore;
use super::error::ClientError;
use ams_core::{RefreshRequest, RefreshResponse};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, Request, Response, StatusCode};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

/// Refresh endpoint, relative to the base URL
pub const REFRESH_PATH: &str = "/auth/refresh-token";

/// Upper bound on a single refresh exchange
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Invoked once per failed exchange, after credentials have been cleared
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// Why a refresh exchange did not produce a new access token
///
/// Cloned to every request queued on the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("refresh rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("refresh endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("refresh timed out after {0:?}")]
    TimedOut(Duration),

    #[error("credential store failed: {0}")]
    Store(String),

    #[error("refresh abandoned before completion")]
    Abandoned,
}

type RefreshOutcome = Result<String, RefreshFailure>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    /// Number of exchanges that settled with a token or a failure
    generation: u64,
    last_outcome: Option<RefreshOutcome>,
}

/// What a denied request does next, decided under the state lock
enum Role {
    Settled(RefreshOutcome),
    Wait(oneshot::Receiver<RefreshOutcome>),
    Initiate,
}

/// Marks the caller as the refresh initiator until the exchange settles.
///
/// Dropping it unsettled (the initiator's future was cancelled) clears the
/// flag and fails the waiters with [`RefreshFailure::Abandoned`] without
/// bumping the generation, so later denials start a new exchange.
struct InFlight<'a> {
    state: &'a Mutex<RefreshState>,
    settled: bool,
}

impl InFlight<'_> {
    /// Clear the flag and release every waiter with `outcome`
    fn settle(mut self, outcome: &RefreshOutcome) -> usize {
        self.release(outcome, true)
    }

    fn release(&mut self, outcome: &RefreshOutcome, record: bool) -> usize {
        self.settled = true;
        let waiters = {
            let mut state = lock(self.state);
            state.in_flight = false;
            if record {
                state.generation += 1;
                state.last_outcome = Some(outcome.clone());
            }
            std::mem::take(&mut state.waiters)
        };

        let count = waiters.len();
        for waiter in waiters {
            // Receiver gone means that request was cancelled
            let _ = waiter.send(outcome.clone());
        }
        count
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Refresh initiator dropped mid-exchange, releasing queued requests");
            self.release(&Err(RefreshFailure::Abandoned), false);
        }
    }
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bearer-token gateway with single-flight token refresh
pub struct AuthGateway {
    http: Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    refresh_timeout: Duration,
    on_session_expired: Option<SessionExpiredHook>,
    refresh: Mutex<RefreshState>,
}

impl AuthGateway {
    /// Create a gateway for `base_url` (no trailing slash)
    pub fn new(http: Client, base_url: impl Into<String>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            store,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            on_session_expired: None,
            refresh: Mutex::new(RefreshState::default()),
        }
    }

    /// Bound each refresh exchange by `timeout`
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Run `hook` whenever a refresh fails and the session is cleared
    pub fn with_session_expired_hook(mut self, hook: SessionExpiredHook) -> Self {
        self.on_session_expired = Some(hook);
        self
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Whether a refresh exchange is currently running
    pub fn refresh_in_flight(&self) -> bool {
        lock(&self.refresh).in_flight
    }

    /// Number of requests waiting on the running exchange
    pub fn queued_requests(&self) -> usize {
        lock(&self.refresh).waiters.len()
    }

    fn generation(&self) -> u64 {
        lock(&self.refresh).generation
    }

    /// Send `request` with the stored bearer token, refreshing it once on 401
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let replay = request.try_clone();
        // Read before the token so the token is never older than the generation
        let generation = self.generation();
        let token = self.store.load().await?.access_token;
        let response = self.dispatch(request, token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(replay) = replay else {
            warn!(url = %response.url(), "Authorization denied on a request that cannot be replayed");
            return Ok(response);
        };

        debug!(url = %replay.url(), "Authorization denied, obtaining a fresh access token");
        let token = self.fresh_token(generation).await?;
        self.dispatch(replay, Some(&token)).await
    }

    /// Send `request` with the stored bearer token and no refresh handling
    pub async fn send_unguarded(&self, request: Request) -> Result<Response, ClientError> {
        let token = self.store.load().await?.access_token;
        self.dispatch(request, token.as_deref()).await
    }

    async fn dispatch(&self, mut request: Request, token: Option<&str>) -> Result<Response, ClientError> {
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ClientError::Configuration("stored access token is not a valid header value".into())
            })?;
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        self.http.execute(request).await.map_err(ClientError::Network)
    }

    /// Token to replay a denied request with
    ///
    /// `seen` is the generation the denied request was sent under.
    async fn fresh_token(&self, seen: u64) -> Result<String, ClientError> {
        let role = {
            let mut state = lock(&self.refresh);
            if state.generation != seen {
                Role::Settled(
                    state
                        .last_outcome
                        .clone()
                        .unwrap_or(Err(RefreshFailure::Abandoned)),
                )
            } else if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Role::Wait(rx)
            } else {
                state.in_flight = true;
                Role::Initiate
            }
        };

        match role {
            Role::Settled(outcome) => {
                debug!("Exchange settled since the request was sent, reusing its outcome");
                return outcome.map_err(ClientError::from);
            }
            Role::Wait(rx) => {
                debug!("Refresh already in flight, queueing request");
                let outcome = rx.await.unwrap_or(Err(RefreshFailure::Abandoned));
                return outcome.map_err(ClientError::from);
            }
            Role::Initiate => {}
        }

        let guard = InFlight {
            state: &self.refresh,
            settled: false,
        };

        let outcome = match self.exchange().await {
            Ok(token) => match self.store.set_access_token(&token).await {
                Ok(()) => Ok(token),
                Err(e) => Err(RefreshFailure::Store(e.to_string())),
            },
            Err(failure) => Err(failure),
        };

        if let Err(failure) = &outcome {
            warn!(%failure, "Token refresh failed, clearing session");
            if let Err(e) = self.store.clear().await {
                error!(error = %e, "Failed to clear credentials after refresh failure");
            }
        }

        let released = guard.settle(&outcome);

        match &outcome {
            Ok(_) => info!(released, "Access token refreshed"),
            Err(_) => {
                if let Some(hook) = &self.on_session_expired {
                    hook();
                }
            }
        }

        outcome.map_err(ClientError::from)
    }

    /// Exchange the stored refresh token for a new access token
    async fn exchange(&self) -> RefreshOutcome {
        let refresh_token = self
            .store
            .load()
            .await
            .map_err(|e| RefreshFailure::Store(e.to_string()))?
            .refresh_token
            .ok_or(RefreshFailure::MissingRefreshToken)?;

        let url = format!("{}{}", self.base_url, REFRESH_PATH);
        let call = async {
            let response = self
                .http
                .post(&url)
                .json(&RefreshRequest { refresh_token })
                .send()
                .await
                .map_err(|e| RefreshFailure::Unreachable(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_else(|_| status.to_string());
                return Err(RefreshFailure::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: RefreshResponse = response
                .json()
                .await
                .map_err(|e| RefreshFailure::InvalidResponse(e.to_string()))?;

            if body.access_token.is_empty() {
                return Err(RefreshFailure::InvalidResponse("empty accessToken".into()));
            }
            Ok(body.access_token)
        };

        tokio::time::timeout(self.refresh_timeout, call)
            .await
            .map_err(|_| RefreshFailure::TimedOut(self.refresh_timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::credentials::MemoryCredentialStore;

    fn gateway() -> AuthGateway {
        AuthGateway::new(
            Client::new(),
            "http://127.0.0.1:9",
            Arc::new(MemoryCredentialStore::new()),
        )
    }

    #[test]
    fn test_settle_releases_waiters_and_clears_flag() {
        let state = Mutex::new(RefreshState::default());
        let (tx1, mut rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        {
            let mut s = lock(&state);
            s.in_flight = true;
            s.waiters.push(tx1);
            s.waiters.push(tx2);
        }

        let guard = InFlight {
            state: &state,
            settled: false,
        };
        let released = guard.settle(&Ok("new-token".to_string()));

        assert_eq!(released, 2);
        assert!(!lock(&state).in_flight);
        assert!(lock(&state).waiters.is_empty());
        assert_eq!(rx1.try_recv().unwrap(), Ok("new-token".to_string()));
        assert_eq!(rx2.try_recv().unwrap(), Ok("new-token".to_string()));
    }

    #[test]
    fn test_dropped_initiator_abandons_waiters() {
        let state = Mutex::new(RefreshState::default());
        let (tx, mut rx) = oneshot::channel();
        {
            let mut s = lock(&state);
            s.in_flight = true;
            s.waiters.push(tx);
        }

        drop(InFlight {
            state: &state,
            settled: false,
        });

        assert!(!lock(&state).in_flight);
        assert_eq!(lock(&state).generation, 0);
        assert!(lock(&state).last_outcome.is_none());
        assert_eq!(rx.try_recv().unwrap(), Err(RefreshFailure::Abandoned));
    }

    #[test]
    fn test_settle_records_outcome_and_bumps_generation() {
        let state = Mutex::new(RefreshState::default());
        let guard = InFlight {
            state: &state,
            settled: false,
        };
        guard.settle(&Ok("new-token".to_string()));

        let state = lock(&state);
        assert_eq!(state.generation, 1);
        assert_eq!(state.last_outcome, Some(Ok("new-token".to_string())));
    }

    #[test]
    fn test_settle_tolerates_cancelled_waiters() {
        let state = Mutex::new(RefreshState::default());
        let (tx, rx) = oneshot::channel();
        lock(&state).waiters.push(tx);
        drop(rx);

        let guard = InFlight {
            state: &state,
            settled: false,
        };
        assert_eq!(guard.settle(&Err(RefreshFailure::MissingRefreshToken)), 1);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_without_network() {
        let gateway = gateway();
        let result = gateway.exchange().await;
        assert_eq!(result, Err(RefreshFailure::MissingRefreshToken));
    }

    #[tokio::test]
    async fn test_fresh_token_clears_flag_on_failure() {
        let gateway = gateway();
        let result = gateway.fresh_token(0).await;

        assert!(matches!(
            result,
            Err(ClientError::SessionExpired(RefreshFailure::MissingRefreshToken))
        ));
        assert!(!gateway.refresh_in_flight());
        assert_eq!(gateway.queued_requests(), 0);
        assert_eq!(gateway.generation(), 1);
    }

    #[tokio::test]
    async fn test_late_denial_reuses_settled_failure_without_hook() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let gateway = gateway().with_session_expired_hook(Arc::new(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }));

        let first = gateway.fresh_token(0).await;
        assert!(matches!(
            first,
            Err(ClientError::SessionExpired(RefreshFailure::MissingRefreshToken))
        ));

        // A request sent under generation 0 whose 401 arrives afterwards
        let late = gateway.fresh_token(0).await;
        assert!(matches!(
            late,
            Err(ClientError::SessionExpired(RefreshFailure::MissingRefreshToken))
        ));
        assert_eq!(gateway.generation(), 1);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_late_denial_reuses_settled_token() {
        let gateway = gateway();
        {
            let mut state = lock(&gateway.refresh);
            state.generation = 3;
            state.last_outcome = Some(Ok("fresh".to_string()));
        }

        let token = gateway.fresh_token(2).await.unwrap();
        assert_eq!(token, "fresh");
        assert!(!gateway.refresh_in_flight());
    }
}
