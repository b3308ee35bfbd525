//! Process-wide session state
//!
//! The session store is the only mutable shared resource in the client. All
//! mutation goes through its narrow operation set; callers get read-only
//! snapshots and never reach into the fields directly.

use crate::error::Result;
use crate::session::persist::{self, ProjectionStorage};
use crate::session::Identity;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct SessionState {
    access_token: Option<String>,
    identity: Option<Identity>,
    authenticated: bool,
    session_expired: bool,
}

/// Read-only copy of the current session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub access_token: Option<String>,
    pub identity: Option<Identity>,
    pub authenticated: bool,
    pub session_expired: bool,
}

/// Holds the current access token and resolved identity
pub struct SessionStore {
    state: Arc<RwLock<SessionState>>,
    storage: Arc<dyn ProjectionStorage>,
}

impl SessionStore {
    /// Create an empty session backed by the given projection storage
    pub fn new(storage: Arc<dyn ProjectionStorage>) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            storage,
        }
    }

    /// Load the persisted projection into memory.
    ///
    /// The access token is never persisted, so a restored session always
    /// starts without one and needs a refresh before authorized calls work.
    pub async fn restore(&self) -> Result<()> {
        let projection = persist::load_projection(self.storage.as_ref())?;
        if projection.authenticated {
            debug!("Restored persisted session");
            let mut state = self.state.write().await;
            state.identity = projection.identity;
            state.authenticated = true;
        }
        Ok(())
    }

    /// Replace the access token. The identity is untouched.
    pub async fn set_token(&self, token: String) {
        self.state.write().await.access_token = Some(token);
    }

    /// Replace the identity and mark the session authenticated
    pub async fn set_identity(&self, identity: Identity) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.identity = Some(identity);
            state.authenticated = true;
        }
        self.persist().await
    }

    /// Drop the token and identity and wipe the persisted projection.
    ///
    /// Idempotent; clearing an already-clear session does nothing.
    pub async fn clear(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if state.access_token.is_none() && state.identity.is_none() && !state.authenticated {
                return Ok(());
            }
            warn!("Clearing session");
            state.access_token = None;
            state.identity = None;
            state.authenticated = false;
        }
        self.persist().await
    }

    /// Flag the session as expired so the UI can prompt for re-login
    pub async fn mark_session_expired(&self) {
        self.state.write().await.session_expired = true;
    }

    /// Drop the expired flag, typically after a successful login
    pub async fn resolve_session_expired(&self) {
        self.state.write().await.session_expired = false;
    }

    /// Current access token, if any
    pub async fn access_token(&self) -> Option<String> {
        self.state.read().await.access_token.clone()
    }

    /// Read-only copy of the full session state
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            access_token: state.access_token.clone(),
            identity: state.identity.clone(),
            authenticated: state.authenticated,
            session_expired: state.session_expired,
        }
    }

    async fn persist(&self) -> Result<()> {
        let state = self.state.read().await;
        persist::save_projection(
            self.storage.as_ref(),
            state.authenticated,
            state.identity.as_ref(),
        )
    }
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            storage: Arc::clone(&self.storage),
        }
    }
}
