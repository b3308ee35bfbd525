//! Authenticated API client
//!
//! Wraps the HTTP client with the session lifecycle: every outgoing request
//! passes through the request authorizer, and 401 responses are routed
//! through the refresh coordinator before a single replay.

pub mod profile;
pub mod refresh;

use crate::config::{ApiConfig, Config};
use crate::error::{Error, Result};
use crate::session::{FileStorage, Identity, ProjectionStorage, SessionSnapshot, SessionStore};
use refresh::RefreshGate;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Login response from the server
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// API client holding the session store and refresh coordinator
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
    session: SessionStore,
    refresh: RefreshGate,
}

impl ApiClient {
    /// Create a client with file-backed session persistence
    pub fn new(config: &Config) -> Result<Self> {
        let storage = Arc::new(FileStorage::new(&config.storage.session_file));
        Self::with_storage(config.api.clone(), storage)
    }

    /// Create a client over an explicit projection storage backend
    pub fn with_storage(config: ApiConfig, storage: Arc<dyn ProjectionStorage>) -> Result<Self> {
        // The cookie store carries the out-of-band refresh credential
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            config,
            session: SessionStore::new(storage),
            refresh: RefreshGate::new(),
        })
    }

    /// The shared session store, for read-only consumers like routing guards
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Read-only copy of the current session
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot().await
    }

    /// Issue an authorized request, refreshing the session once on a 401.
    ///
    /// The request is rebuilt for the replay so the freshly refreshed token
    /// is attached. A request is never replayed more than once, and a 401
    /// from the refresh endpoint itself is never eligible.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let url = self.endpoint(path);
        // Recorded before the first send: if a refresh completes while this
        // request is in flight, its 401 is stale and the replay can reuse
        // the already-refreshed token without another refresh call.
        let entry_generation = self.refresh.generation().await;
        let mut retried = false;

        loop {
            let mut request = self.http.request(method.clone(), &url);
            if let Some(ref body) = body {
                request = request.json(body);
            }
            let response = self.authorize(request).await.send().await?;

            if response.status() == StatusCode::UNAUTHORIZED
                && !retried
                && path != self.config.refresh_path
            {
                debug!(%path, "Request was unauthorized, refreshing session");
                retried = true;
                self.refresh_session(entry_generation).await?;
                continue;
            }

            return Ok(response);
        }
    }

    /// Convenience wrapper for authorized GET requests
    pub async fn get(&self, path: &str) -> Result<Response> {
        self.execute(Method::GET, path, None).await
    }

    /// Authenticate with the login endpoint and resolve the profile.
    ///
    /// The login endpoint is independent of the refresh cycle; its failure
    /// never triggers a refresh.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity> {
        let body = serde_json::json!({ "username": username, "password": password });
        let response = self
            .http
            .post(self.endpoint(&self.config.login_path))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus(response.status()));
        }

        let body: LoginResponse = response.json().await?;
        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(Error::NoAccessTokenReturned)?;

        self.session.set_token(token).await;
        let identity = self.resolve_profile().await?;
        self.session.resolve_session_expired().await;

        info!(username, role = %identity.role(), "Logged in");
        Ok(identity)
    }

    /// Clear the session, notifying the server best-effort first
    pub async fn logout(&self) -> Result<()> {
        let request = self
            .authorize(self.http.post(self.endpoint(&self.config.logout_path)))
            .await;
        if let Err(e) = request.send().await {
            debug!("Server-side logout failed: {}", e);
        }
        self.session.clear().await
    }

    /// Startup path: load the persisted projection and, if it claims an
    /// authenticated session, complete one refresh cycle to obtain a token.
    ///
    /// Returns whether the session is usable afterwards. A failed startup
    /// refresh leaves the session cleared and flagged expired.
    pub async fn restore_session(&self) -> Result<bool> {
        self.session.restore().await?;
        if !self.session.snapshot().await.authenticated {
            return Ok(false);
        }

        let entry_generation = self.refresh.generation().await;
        match self.refresh_session(entry_generation).await {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!("Startup refresh failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Attach the current access token as a bearer credential, if one is
    /// held. Requests without a session token go out unmodified.
    pub(crate) async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.access_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}
