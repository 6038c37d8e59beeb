//! Bearer-token client with coordinated token refresh.
//!
//! # Design
//! Every request goes out with the stored access token. A 401 starts a
//! refresh episode: the first request to see it becomes the leader and calls
//! the refresh endpoint; requests that hit a 401 while the leader is working
//! park on a oneshot channel in the `RefreshGate` and receive the leader's
//! outcome. Each request is retried at most once.
//!
//! A request whose 401 arrives after a refresh already rotated the token is
//! retried with the rotated token instead of starting a second episode. The
//! gate decides this under its own lock.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::client::RegistryClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::observable::{Observable, Subscription};
use crate::session::{Session, SessionStore};
use crate::transport::Transport;
use crate::types::AuthResponse;

const UNAUTHORIZED: u16 = 401;

/// Where the user stands with respect to the login boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No session has been established.
    Anonymous,
    Authenticated,
    /// The session was lost; front ends should send the user to login.
    LoginRequired,
}

type RefreshOutcome = Result<String, ApiError>;

#[derive(Default)]
struct GateState {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    /// Access token most recently issued by login or refresh.
    current_token: Option<String>,
}

/// Single-slot lock over the refresh call plus the requests parked behind it.
///
/// The rotated-token check and the leader election happen under the same
/// lock, so a denial racing a finished refresh never starts a second one.
#[derive(Default)]
struct RefreshGate {
    state: Mutex<GateState>,
}

enum Entry<'a> {
    Leader(LeaderGuard<'a>),
    Follower(oneshot::Receiver<RefreshOutcome>),
    /// The token was rotated after the denied request went out.
    Rotated(String),
}

impl RefreshGate {
    fn enter(&self, sent_token: Option<&str>) -> Entry<'_> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.in_progress {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            return Entry::Follower(rx);
        }
        if let Some(current) = state
            .current_token
            .as_ref()
            .filter(|current| sent_token != Some(current.as_str()))
        {
            return Entry::Rotated(current.clone());
        }
        state.in_progress = true;
        Entry::Leader(LeaderGuard {
            gate: self,
            outcome: None,
        })
    }

    fn record_token(&self, token: Option<String>) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).current_token = token;
    }

    fn is_open(&self) -> bool {
        !self.state.lock().unwrap_or_else(|e| e.into_inner()).in_progress
    }
}

/// Clears the in-progress flag when dropped. Waiters receive the recorded
/// outcome, or see their channel closed if the leader never settled.
struct LeaderGuard<'a> {
    gate: &'a RefreshGate,
    outcome: Option<RefreshOutcome>,
}

impl LeaderGuard<'_> {
    fn settle(mut self, outcome: RefreshOutcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        let waiters = {
            let mut state = self.gate.state.lock().unwrap_or_else(|e| e.into_inner());
            match &self.outcome {
                Some(Ok(token)) => state.current_token = Some(token.clone()),
                Some(Err(_)) => state.current_token = None,
                None => {}
            }
            state.in_progress = false;
            std::mem::take(&mut state.waiters)
        };
        if let Some(outcome) = self.outcome.take() {
            debug!(waiters = waiters.len(), "releasing requests queued on refresh");
            for waiter in waiters {
                let _ = waiter.send(outcome.clone());
            }
        }
    }
}

/// Sends requests with the session's bearer token and recovers from expired
/// access tokens.
pub struct AuthenticatedClient {
    codec: RegistryClient,
    transport: Arc<dyn Transport>,
    sessions: Arc<dyn SessionStore>,
    gate: RefreshGate,
    auth_state: Observable<AuthState>,
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("codec", &self.codec)
            .field("auth_state", &self.auth_state.get())
            .finish_non_exhaustive()
    }
}

impl AuthenticatedClient {
    pub fn new(
        codec: RegistryClient,
        transport: Arc<dyn Transport>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let initial = match sessions.load() {
            Ok(session) if session.is_authenticated() => AuthState::Authenticated,
            Ok(_) => AuthState::Anonymous,
            Err(e) => {
                warn!(error = %e, "could not read stored session");
                AuthState::Anonymous
            }
        };
        Self {
            codec,
            transport,
            sessions,
            gate: RefreshGate::default(),
            auth_state: Observable::new(initial),
        }
    }

    pub fn codec(&self) -> &RegistryClient {
        &self.codec
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth_state.get()
    }

    pub fn subscribe_auth_state(&self) -> Subscription<AuthState> {
        self.auth_state.subscribe()
    }

    pub fn session(&self) -> Result<Session, ApiError> {
        Ok(self.sessions.load()?)
    }

    /// Whether no refresh episode is currently running.
    pub fn is_refresh_idle(&self) -> bool {
        self.gate.is_open()
    }

    /// Persist the token pair from a successful login.
    pub fn establish(&self, auth: &AuthResponse) -> Result<(), ApiError> {
        let session = Session {
            access_token: Some(auth.access_token.clone()),
            refresh_token: auth.refresh_token.clone(),
        };
        self.sessions.store(&session)?;
        self.gate.record_token(session.access_token);
        self.auth_state.publish(AuthState::Authenticated);
        Ok(())
    }

    /// Drop the stored tokens after an explicit logout.
    pub fn end_session(&self) -> Result<(), ApiError> {
        self.sessions.clear()?;
        self.gate.record_token(None);
        self.auth_state.publish(AuthState::Anonymous);
        Ok(())
    }

    /// Send without credentials and without refresh handling.
    pub async fn send_anonymous(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.transport.execute(request).await
    }

    /// Send with the stored bearer token, refreshing it once on a 401.
    ///
    /// Non-401 responses are returned as-is for the codec to interpret.
    ///
    /// # Errors
    /// Transport failures propagate unchanged. `SessionExpired` when the
    /// session could not be refreshed, `Unauthorized` when the retried request
    /// is denied again.
    pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let sent_token = self.sessions.load()?.access_token;
        if let Some(token) = &sent_token {
            request.set_bearer(token);
        }

        let response = self.transport.execute(request.clone()).await?;
        if response.status != UNAUTHORIZED {
            return Ok(response);
        }
        debug!(url = %request.path, "authorization denied");

        let token = self.refresh_after_denial(sent_token.as_deref()).await?;
        request.set_bearer(&token);

        let retried = self.transport.execute(request).await?;
        if retried.status == UNAUTHORIZED {
            warn!("request denied again after token refresh");
            return Err(ApiError::Unauthorized);
        }
        Ok(retried)
    }

    async fn refresh_after_denial(&self, sent_token: Option<&str>) -> RefreshOutcome {
        match self.gate.enter(sent_token) {
            Entry::Rotated(token) => {
                debug!("token already rotated; retrying without refresh");
                Ok(token)
            }
            Entry::Follower(rx) => {
                debug!("waiting on in-flight token refresh");
                rx.await.unwrap_or(Err(ApiError::RefreshAborted))
            }
            Entry::Leader(guard) => {
                let outcome = self.perform_refresh().await;
                guard.settle(outcome.clone());
                outcome
            }
        }
    }

    async fn perform_refresh(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.sessions.load()?.refresh_token else {
            warn!("no refresh token stored; login required");
            self.expire_session();
            return Err(ApiError::SessionExpired("no refresh token".to_string()));
        };

        let request = self.codec.build_refresh(&refresh_token);
        let result = match self.transport.execute(request).await {
            Ok(response) => self.codec.parse_auth(response),
            Err(e) => Err(e),
        };

        match result {
            Ok(auth) => {
                let session = Session {
                    access_token: Some(auth.access_token.clone()),
                    refresh_token: auth.refresh_token.or(Some(refresh_token)),
                };
                self.sessions.store(&session)?;
                self.auth_state.publish(AuthState::Authenticated);
                info!("access token refreshed");
                Ok(auth.access_token)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed; login required");
                self.expire_session();
                Err(ApiError::SessionExpired(e.to_string()))
            }
        }
    }

    fn expire_session(&self) {
        if let Err(e) = self.sessions.clear() {
            warn!(error = %e, "could not clear session storage");
        }
        self.auth_state.publish(AuthState::LoginRequired);
    }
}
