// Single-flight credential refresh
//
// Any number of concurrent callers may observe an expired credential at the
// same time. Exactly one of them (the leader) issues the refresh call; the
// rest (followers) park on a waiter queue and share the leader's outcome.
// Without this, N concurrent 401s would fire N redundant refresh calls, each
// potentially invalidating the others' session proof.

use reqwest::Client;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::oneshot;

use super::store::CredentialStore;
use super::types::{Credential, IdentitySnapshot, SessionResponse};
use crate::endpoints;
use crate::session::SessionEvents;

/// Why a refresh failed. Cloneable so one leader failure can reject every
/// queued follower.
#[derive(Debug, Clone, Error)]
#[error("credential refresh failed: {message}")]
pub struct RefreshFailure {
    /// HTTP status from the refresh endpoint, when it responded at all
    pub status: Option<u16>,
    pub message: String,
}

impl RefreshFailure {
    fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

type WaiterResult = Result<Credential, RefreshFailure>;

struct RefreshState {
    /// A leader refresh is in flight
    refreshing: bool,
    /// Followers parked until the current leader resolves them.
    /// Invariant: non-empty only while `refreshing` is true; always fully
    /// drained before the flag resets.
    waiters: Vec<oneshot::Sender<WaiterResult>>,
}

/// Owns the single-flight refresh protocol and the waiter queue.
///
/// One instance per client; its lifecycle is tied to the client rather than
/// to process-wide state, so independent sessions never share refresh state.
pub struct RefreshCoordinator {
    http: Client,
    base_url: String,
    store: Arc<CredentialStore>,
    events: Arc<SessionEvents>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        http: Client,
        base_url: String,
        store: Arc<CredentialStore>,
        events: Arc<SessionEvents>,
    ) -> Self {
        Self {
            http,
            base_url,
            store,
            events,
            state: Mutex::new(RefreshState {
                refreshing: false,
                waiters: Vec::new(),
            }),
        }
    }

    /// Obtain a credential that post-dates the current one, refreshing at
    /// most once no matter how many callers arrive concurrently.
    pub async fn ensure_fresh_credential(&self) -> Result<Credential, RefreshFailure> {
        // The flag check and claim happen under one lock acquisition, before
        // any suspension point; the lock is never held across an await.
        let follower_rx = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = follower_rx {
            tracing::debug!("Refresh already in flight, waiting for its outcome");
            return match rx.await {
                Ok(outcome) => outcome,
                // The leader drains the queue before resetting the flag, so a
                // dropped sender means the leader itself was torn down.
                Err(_) => Err(RefreshFailure::transport("refresh leader went away")),
            };
        }

        self.events.authenticating();
        tracing::debug!("Leading credential refresh");
        let outcome = self.call_refresh_endpoint().await;

        // Reset the flag and capture the queue in one step: every follower
        // enqueued while this refresh was outstanding observes this outcome,
        // never a subsequent one.
        let waiters = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        match outcome {
            Ok((credential, identity)) => {
                self.store.set(credential.clone(), identity.clone());
                self.events.authenticated(&identity);
                tracing::info!(waiters = waiters.len(), "Credential refreshed");

                for waiter in waiters {
                    let _ = waiter.send(Ok(credential.clone()));
                }
                Ok(credential)
            }
            Err(failure) => {
                tracing::warn!(
                    waiters = waiters.len(),
                    error = %failure,
                    "Credential refresh failed, tearing down session"
                );
                self.store.clear();

                for waiter in waiters {
                    let _ = waiter.send(Err(failure.clone()));
                }

                self.events.session_lost();
                Err(failure)
            }
        }
    }

    /// One refresh call against the authentication endpoint. The durable
    /// session proof travels in the shared cookie jar; the expired
    /// credential plays no part.
    async fn call_refresh_endpoint(
        &self,
    ) -> Result<(Credential, IdentitySnapshot), RefreshFailure> {
        let url = format!("{}{}", self.base_url, endpoints::REFRESH);

        let response = self.http.post(&url).send().await.map_err(|e| {
            RefreshFailure::transport(format!("refresh request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RefreshFailure {
                status: Some(status.as_u16()),
                message: format!("refresh endpoint returned {}: {}", status, body),
            });
        }

        let session: SessionResponse = response.json().await.map_err(|e| {
            RefreshFailure::transport(format!("failed to parse refresh response: {}", e))
        })?;

        if session.token.is_empty() {
            return Err(RefreshFailure::transport(
                "refresh response does not contain a token",
            ));
        }

        Ok((Credential::new(session.token), session.admin))
    }
}
