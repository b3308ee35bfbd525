//! Session refresh coordination
//!
//! A 401 means the access token is no longer good; the coordinator swaps it
//! for a fresh one via the refresh endpoint and re-validates it end-to-end
//! before anyone gets to use it. Concurrent 401s from unrelated in-flight
//! requests must share exactly one refresh call per wave, so the gate is a
//! generation-counted critical section: whoever enters first performs the
//! refresh, everyone who was queued behind it adopts the recorded outcome.

use super::ApiClient;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Refresh response from the server
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(default)]
    access_token: Option<String>,
}

struct GateState {
    /// Bumped once per completed refresh, success or failure
    generation: u64,
    /// Outcome of the most recent refresh, replayed to late arrivals
    last_outcome: std::result::Result<(), String>,
}

/// Single-flight guard around the refresh procedure
#[derive(Clone)]
pub(crate) struct RefreshGate {
    state: Arc<Mutex<GateState>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState {
                generation: 0,
                last_outcome: Ok(()),
            })),
        }
    }

    /// Current refresh generation, recorded by callers before they send
    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }
}

impl ApiClient {
    /// Drive one refresh cycle, or join the one that already ran.
    ///
    /// `entry_generation` is the gate generation the caller observed before
    /// sending the request that 401'd. If the generation has moved by the
    /// time the caller holds the gate, a refresh already completed for this
    /// wave and its outcome is adopted instead of issuing a second call.
    pub(crate) async fn refresh_session(&self, entry_generation: u64) -> Result<()> {
        let mut gate = self.refresh.state.lock().await;

        if gate.generation != entry_generation {
            return match &gate.last_outcome {
                Ok(()) => Ok(()),
                Err(message) => Err(Error::RefreshFailed(message.clone())),
            };
        }

        debug!("Refreshing session");
        let result = self.perform_refresh().await;
        gate.generation += 1;
        gate.last_outcome = result.as_ref().map(|_| ()).map_err(|e| e.to_string());
        result
    }

    /// The refresh procedure itself, run while the gate is held.
    ///
    /// Any failure clears the session and flags it expired; a failed refresh
    /// is never retried automatically.
    async fn perform_refresh(&self) -> Result<()> {
        let token = match self.request_new_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!("Session refresh failed: {}", e);
                self.expire_session().await;
                return Err(e);
            }
        };

        self.session.set_token(token).await;

        // The refresh call returning a token is not enough: the token has to
        // survive profile validation before the session counts as recovered.
        match self.resolve_profile().await {
            Ok(identity) => {
                info!(role = %identity.role(), "Session refreshed");
                Ok(())
            }
            Err(e) => {
                warn!("Refreshed token failed validation: {}", e);
                // The resolver already cleared the session
                self.session.mark_session_expired().await;
                Err(e)
            }
        }
    }

    /// Call the refresh endpoint and extract the new access token.
    ///
    /// The request carries no bearer credential; the refresh endpoint is
    /// authorized out-of-band by the HTTP-only cookie in the client's jar.
    async fn request_new_token(&self) -> Result<String> {
        let response = self
            .http
            .post(self.endpoint(&self.config.refresh_path))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus(response.status()));
        }

        let body: RefreshResponse = response.json().await?;
        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or(Error::NoAccessTokenReturned)
    }

    async fn expire_session(&self) {
        if let Err(e) = self.session.clear().await {
            warn!("Failed to clear session: {}", e);
        }
        self.session.mark_session_expired().await;
    }
}
