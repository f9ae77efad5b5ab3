// Session lifecycle
// Login, logout, the startup probe, and session-loss notification.

use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::auth::{
    Credential, CredentialStore, IdentityCache, IdentitySnapshot, LoginRequest, RefreshCoordinator,
    SessionResponse,
};
use crate::endpoints;
use crate::error::ApiError;

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session; the UI should show the login view
    Anonymous,
    /// Login or refresh in flight (including the startup probe)
    Authenticating,
    /// A credential is committed and requests are expected to succeed
    Authenticated,
}

type LostCallback = Box<dyn Fn() + Send + Sync>;

/// Shared session signal: state, teardown effects, and session-loss
/// listeners.
///
/// Written by the session lifecycle and the refresh coordinator only. The
/// `lost_notified` flag guards against duplicate redirects when several
/// concurrent calls fail after the session is already known lost; it starts
/// raised because a fresh process has no session to lose, and is re-armed on
/// every successful login or refresh.
pub struct SessionEvents {
    state: RwLock<SessionState>,
    store: Arc<CredentialStore>,
    identity_cache: IdentityCache,
    callbacks: Mutex<Vec<LostCallback>>,
    lost_notified: AtomicBool,
}

impl SessionEvents {
    pub(crate) fn new(store: Arc<CredentialStore>, identity_cache: IdentityCache) -> Self {
        Self {
            state: RwLock::new(SessionState::Authenticating),
            store,
            identity_cache,
            callbacks: Mutex::new(Vec::new()),
            lost_notified: AtomicBool::new(true),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Register a listener for terminal session loss. Typically routes the
    /// UI to the login view.
    pub fn on_session_lost(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(callback));
    }

    /// Last cached identity snapshot, for warm-start UI only.
    pub fn cached_identity(&self) -> Option<IdentitySnapshot> {
        self.identity_cache.load()
    }

    /// A login or refresh attempt is in flight.
    pub(crate) fn authenticating(&self) {
        self.set_state(SessionState::Authenticating);
    }

    /// A credential was committed; re-arm the loss signal and persist the
    /// snapshot for the next warm start.
    pub(crate) fn authenticated(&self, identity: &IdentitySnapshot) {
        self.identity_cache.store(identity);
        self.set_state(SessionState::Authenticated);
        self.lost_notified.store(false, Ordering::SeqCst);
    }

    /// A login attempt failed without an established session to tear down.
    pub(crate) fn login_failed(&self) {
        self.set_state(SessionState::Anonymous);
    }

    /// Terminal authentication failure: clear everything and notify
    /// listeners exactly once per loss event.
    pub(crate) fn session_lost(&self) {
        self.set_state(SessionState::Anonymous);

        if self.lost_notified.swap(true, Ordering::SeqCst) {
            return;
        }

        self.store.clear();
        self.identity_cache.clear();
        tracing::warn!("Session lost, notifying listeners");

        let callbacks = self.callbacks.lock().unwrap_or_else(|e| e.into_inner());
        for callback in callbacks.iter() {
            callback();
        }
    }

    /// User-initiated teardown; suppresses the session-lost redirect.
    pub(crate) fn logged_out(&self) {
        self.lost_notified.store(true, Ordering::SeqCst);
        self.store.clear();
        self.identity_cache.clear();
        self.set_state(SessionState::Anonymous);
    }
}

/// Orchestrates login, logout, and the startup session probe.
///
/// Talks to the session endpoints directly rather than through the request
/// pipeline: those endpoints are never subject to refresh-and-replay, and
/// the durable session proof travels in the cookie jar of the shared HTTP
/// client, not in an Authorization header.
pub struct SessionLifecycle {
    http: Client,
    base_url: String,
    store: Arc<CredentialStore>,
    events: Arc<SessionEvents>,
    refresher: Arc<RefreshCoordinator>,
}

impl SessionLifecycle {
    pub(crate) fn new(
        http: Client,
        base_url: String,
        store: Arc<CredentialStore>,
        events: Arc<SessionEvents>,
        refresher: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            http,
            base_url,
            store,
            events,
            refresher,
        }
    }

    pub fn state(&self) -> SessionState {
        self.events.state()
    }

    pub fn on_session_lost(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.events.on_session_lost(callback);
    }

    /// Cached identity for warm-start UI. Never a trust credential.
    pub fn warm_identity(&self) -> Option<IdentitySnapshot> {
        self.events.cached_identity()
    }

    /// Startup probe: silently attempt a refresh against the durable session
    /// cookie. Resolves the initial `Authenticating` state to
    /// `Authenticated` or `Anonymous`.
    pub async fn initialize(&self) -> SessionState {
        tracing::debug!("Probing for an existing session");

        if let Err(e) = self.refresher.ensure_fresh_credential().await {
            tracing::info!("No existing session: {}", e);
        }

        self.state()
    }

    /// Authenticate with identifier and secret. On success the server also
    /// sets the durable session cookie that later refreshes consume.
    pub async fn login(&self, email: &str, password: &str) -> Result<IdentitySnapshot, ApiError> {
        self.events.authenticating();

        let url = format!("{}{}", self.base_url, endpoints::LOGIN);
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = match self.http.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                self.events.login_failed();
                return Err(ApiError::Transport(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Login rejected");
            self.events.login_failed();

            return Err(if status.as_u16() == 401 || status.as_u16() == 403 {
                ApiError::Unauthorized(format!("login rejected: {}", message))
            } else {
                ApiError::Api {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        let session: SessionResponse = response.json().await.map_err(|e| {
            self.events.login_failed();
            ApiError::Transport(e)
        })?;

        if session.token.is_empty() {
            self.events.login_failed();
            return Err(ApiError::Internal(anyhow::anyhow!(
                "login response does not contain a token"
            )));
        }

        self.store
            .set(Credential::new(session.token), session.admin.clone());
        self.events.authenticated(&session.admin);
        tracing::info!(email = %session.admin.email, "Logged in");

        Ok(session.admin)
    }

    /// Best-effort-notify the server, then unconditionally clear local
    /// state. A correct logout must not depend on server reachability.
    pub async fn logout(&self) {
        let url = format!("{}{}", self.base_url, endpoints::LOGOUT);

        match self.http.post(&url).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(
                    status = response.status().as_u16(),
                    "Logout endpoint rejected the request"
                );
            }
            Ok(_) => tracing::debug!("Server session invalidated"),
            Err(e) => tracing::warn!("Logout request failed: {}", e),
        }

        self.events.logged_out();
        tracing::info!("Logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RefreshCoordinator;
    use std::sync::atomic::AtomicUsize;

    fn identity() -> IdentitySnapshot {
        IdentitySnapshot {
            name: "Test Admin".to_string(),
            email: "admin@store.test".to_string(),
            role: "admin".to_string(),
        }
    }

    fn lifecycle_with_base_url(base_url: &str) -> (SessionLifecycle, Arc<SessionEvents>) {
        let store = Arc::new(CredentialStore::new());
        let events = Arc::new(SessionEvents::new(
            store.clone(),
            IdentityCache::new(None),
        ));
        let http = Client::new();
        let refresher = Arc::new(RefreshCoordinator::new(
            http.clone(),
            base_url.to_string(),
            store.clone(),
            events.clone(),
        ));
        let lifecycle = SessionLifecycle::new(
            http,
            base_url.to_string(),
            store,
            events.clone(),
            refresher,
        );
        (lifecycle, events)
    }

    #[test]
    fn test_initial_state_is_authenticating() {
        let (lifecycle, _) = lifecycle_with_base_url("http://127.0.0.1:9");
        assert_eq!(lifecycle.state(), SessionState::Authenticating);
    }

    #[tokio::test]
    async fn test_logout_clears_state_with_unreachable_server() {
        // Port 9 (discard) is not listening; the logout request fails at the
        // transport level, local teardown must still happen.
        let (lifecycle, events) = lifecycle_with_base_url("http://127.0.0.1:9");

        lifecycle
            .store
            .set(Credential::new("tok"), identity());
        events.authenticated(&identity());
        assert_eq!(lifecycle.state(), SessionState::Authenticated);

        lifecycle.logout().await;

        assert_eq!(lifecycle.state(), SessionState::Anonymous);
        assert!(lifecycle.store.get().is_none());
    }

    #[tokio::test]
    async fn test_logout_does_not_fire_session_lost() {
        let (lifecycle, events) = lifecycle_with_base_url("http://127.0.0.1:9");

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        events.on_session_lost(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        events.authenticated(&identity());
        lifecycle.logout().await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_session_lost_fires_exactly_once() {
        let store = Arc::new(CredentialStore::new());
        let events = SessionEvents::new(store.clone(), IdentityCache::new(None));

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        events.on_session_lost(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.set(Credential::new("tok"), identity());
        events.authenticated(&identity());

        events.session_lost();
        events.session_lost();
        events.session_lost();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(events.state(), SessionState::Anonymous);
        assert!(store.get().is_none());
    }

    #[test]
    fn test_session_lost_rearms_after_login() {
        let store = Arc::new(CredentialStore::new());
        let events = SessionEvents::new(store, IdentityCache::new(None));

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        events.on_session_lost(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        events.authenticated(&identity());
        events.session_lost();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // A new session arms the signal again
        events.authenticated(&identity());
        events.session_lost();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_startup_loss_is_silent() {
        // A fresh process has no session to lose: a failed startup probe
        // resolves to anonymous without notifying listeners.
        let store = Arc::new(CredentialStore::new());
        let events = SessionEvents::new(store, IdentityCache::new(None));

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        events.on_session_lost(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        events.session_lost();

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(events.state(), SessionState::Anonymous);
    }
}
