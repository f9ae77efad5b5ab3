// Request pipeline
// Wraps every outbound call: attaches the credential on the way out,
// inspects the response on the way back, and refreshes-and-replays once on
// credential expiry.

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{CredentialStore, IdentityCache, IdentitySnapshot, RefreshCoordinator};
use crate::config::ClientConfig;
use crate::endpoints;
use crate::error::ApiError;
use crate::session::{SessionEvents, SessionLifecycle, SessionState};

/// An outbound call: target, method, payload, headers, plus whether it has
/// already been replayed once after a refresh.
#[derive(Debug)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
    /// A descriptor is replayed at most once for an authentication failure
    retried: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn with_json(mut self, body: &impl Serialize) -> Result<Self, ApiError> {
        self.body =
            Some(serde_json::to_value(body).context("Failed to encode request body")?);
        Ok(self)
    }

    /// Attach an extra header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Authenticated client for the admin API.
///
/// Owns the credential store, the refresh coordinator, and the session
/// lifecycle; the UI issues business requests through it and never touches
/// the credential directly.
pub struct AdminClient {
    http: Client,
    base_url: String,
    store: Arc<CredentialStore>,
    events: Arc<SessionEvents>,
    refresher: Arc<RefreshCoordinator>,
    session: SessionLifecycle,
}

impl AdminClient {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        config.validate()?;

        // One shared client: the cookie jar carries the durable session
        // proof between login and refresh.
        let http = Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        let store = Arc::new(CredentialStore::new());
        let identity_cache = IdentityCache::new(config.identity_cache_path.clone());
        let events = Arc::new(SessionEvents::new(store.clone(), identity_cache));
        let refresher = Arc::new(RefreshCoordinator::new(
            http.clone(),
            config.base_url.clone(),
            store.clone(),
            events.clone(),
        ));
        let session = SessionLifecycle::new(
            http.clone(),
            config.base_url.clone(),
            store.clone(),
            events.clone(),
            refresher.clone(),
        );

        Ok(Self {
            http,
            base_url: config.base_url,
            store,
            events,
            refresher,
            session,
        })
    }

    /// Client with a pre-seeded credential and no identity cache.
    /// Available in test builds and integration tests.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_testing(base_url: impl Into<String>, token: &str) -> anyhow::Result<Self> {
        use crate::auth::Credential;

        let config = ClientConfig::new(base_url).with_identity_cache(None);
        let client = Self::new(config)?;
        client.store.set(
            Credential::new(token),
            IdentitySnapshot {
                name: "Test Admin".to_string(),
                email: "admin@store.test".to_string(),
                role: "admin".to_string(),
            },
        );
        client.events.authenticated(&client.store.identity().unwrap());
        Ok(client)
    }

    /// Session lifecycle: login, logout, startup probe, loss notification.
    pub fn session(&self) -> &SessionLifecycle {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.events.state()
    }

    /// Identity of the signed-in administrator, if any.
    pub fn identity(&self) -> Option<IdentitySnapshot> {
        self.store.identity()
    }

    /// Send a request through the authenticated pipeline.
    ///
    /// 2xx responses are returned as-is. A 401/403 on a business endpoint
    /// triggers one single-flight refresh and one replay; a second 401/403,
    /// or one from a session endpoint, is terminal. Everything else is
    /// propagated verbatim.
    pub async fn send(&self, mut descriptor: RequestDescriptor) -> Result<Response, ApiError> {
        let response = self.dispatch(&descriptor).await?;
        let status = response.status();

        if !is_auth_failure(status) {
            return into_outcome(response).await;
        }

        // A rejection from the session endpoints is terminal by definition;
        // refreshing in response would recurse.
        if endpoints::is_auth_endpoint(&descriptor.path) {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Unauthorized(format!(
                "session endpoint {} rejected the request ({}): {}",
                descriptor.path, status, message
            )));
        }

        if descriptor.retried {
            self.events.session_lost();
            return Err(ApiError::Unauthorized(format!(
                "{} rejected an already-replayed request ({})",
                descriptor.path, status
            )));
        }

        descriptor.retried = true;
        tracing::debug!(
            path = %descriptor.path,
            status = status.as_u16(),
            "Credential rejected, refreshing and replaying"
        );

        // Refresh failure already tore the session down; surface it as a
        // terminal authentication error.
        self.refresher.ensure_fresh_credential().await?;

        let response = self.dispatch(&descriptor).await?;
        let status = response.status();

        if is_auth_failure(status) {
            // Fresh credential, still rejected: the session is not coming
            // back. Bounded retry: never a second replay.
            self.events.session_lost();
            return Err(ApiError::Unauthorized(format!(
                "{} rejected a freshly refreshed credential ({})",
                descriptor.path, status
            )));
        }

        into_outcome(response).await
    }

    /// GET `path` through the pipeline.
    pub async fn get(&self, path: impl Into<String>) -> Result<Response, ApiError> {
        self.send(RequestDescriptor::get(path)).await
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: impl Into<String>,
    ) -> Result<T, ApiError> {
        let response = self.get(path).await?;
        Ok(response.json().await?)
    }

    /// POST `body` to `path` through the pipeline.
    pub async fn post(
        &self,
        path: impl Into<String>,
        body: &impl Serialize,
    ) -> Result<Response, ApiError> {
        self.send(RequestDescriptor::post(path).with_json(body)?).await
    }

    /// PUT `body` to `path` through the pipeline.
    pub async fn put(
        &self,
        path: impl Into<String>,
        body: &impl Serialize,
    ) -> Result<Response, ApiError> {
        self.send(RequestDescriptor::put(path).with_json(body)?).await
    }

    /// PATCH `body` to `path` through the pipeline.
    pub async fn patch(
        &self,
        path: impl Into<String>,
        body: &impl Serialize,
    ) -> Result<Response, ApiError> {
        self.send(RequestDescriptor::patch(path).with_json(body)?).await
    }

    /// DELETE `path` through the pipeline.
    pub async fn delete(&self, path: impl Into<String>) -> Result<Response, ApiError> {
        self.send(RequestDescriptor::delete(path)).await
    }

    /// One transmission attempt: attach the current credential, if any, and
    /// execute. Absence of a credential is not an error at this layer; the
    /// server is the authority on whether that is acceptable.
    async fn dispatch(&self, descriptor: &RequestDescriptor) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.base_url, descriptor.path);

        let mut request = self
            .http
            .request(descriptor.method.clone(), &url)
            .headers(descriptor.headers.clone());

        if let Some(credential) = self.store.get() {
            request = request.header(AUTHORIZATION, credential.bearer());
        }

        if let Some(body) = &descriptor.body {
            request = request.json(body);
        }

        tracing::debug!(
            method = %descriptor.method,
            url = %url,
            replay = descriptor.retried,
            "Sending request"
        );

        Ok(request.send().await?)
    }
}

/// 2xx passes through; anything else (non-auth) becomes a business error
/// carried verbatim.
async fn into_outcome(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    tracing::warn!(
        status = status.as_u16(),
        message = %message,
        "Request failed with error response"
    );

    Err(ApiError::Api {
        status: status.as_u16(),
        message,
    })
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_auth_failure() {
        assert!(is_auth_failure(StatusCode::UNAUTHORIZED));
        assert!(is_auth_failure(StatusCode::FORBIDDEN));
        assert!(!is_auth_failure(StatusCode::OK));
        assert!(!is_auth_failure(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_auth_failure(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn test_descriptor_starts_unretried() {
        let descriptor = RequestDescriptor::get(endpoints::USERS);
        assert!(!descriptor.retried);
        assert_eq!(descriptor.method, Method::GET);
        assert_eq!(descriptor.path, endpoints::USERS);
    }

    #[test]
    fn test_descriptor_with_json_body() {
        let body = serde_json::json!({"status": "delivered"});
        let descriptor = RequestDescriptor::patch(endpoints::order_status("7"))
            .with_json(&body)
            .unwrap();
        assert_eq!(descriptor.body.unwrap()["status"], "delivered");
    }

    #[test]
    fn test_new_for_testing_seeds_credential() {
        let client = AdminClient::new_for_testing("http://127.0.0.1:9", "tok").unwrap();
        assert_eq!(client.store.get().unwrap().token(), "tok");
        assert_eq!(client.state(), SessionState::Authenticated);
    }
}
