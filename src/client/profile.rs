//! Profile resolution
//!
//! Invoked after every token acquisition (login or refresh) to turn a raw
//! access token into a validated identity. A token that fails any step is
//! dropped immediately rather than left in memory to produce confusing
//! delayed 401s later.

use super::ApiClient;
use crate::error::{Error, Result};
use crate::session::{Identity, Role};
use crate::token;
use tracing::{debug, warn};

impl ApiClient {
    /// Resolve the current token into an identity and commit it.
    ///
    /// Every failure branch clears the session before propagating.
    pub async fn resolve_profile(&self) -> Result<Identity> {
        match self.try_resolve_profile().await {
            Ok(identity) => Ok(identity),
            Err(e) => {
                if let Err(clear_err) = self.session.clear().await {
                    warn!("Failed to clear session: {}", clear_err);
                }
                Err(e)
            }
        }
    }

    async fn try_resolve_profile(&self) -> Result<Identity> {
        let access_token = self.session.access_token().await.ok_or(Error::NoToken)?;

        let claims = token::decode_unverified(&access_token)?;

        // Re-checked at every use point; time has passed since decode
        let now = chrono::Utc::now().timestamp();
        if claims.is_expired(now) {
            return Err(Error::TokenExpired);
        }

        let role = claims.recognized_role().ok_or_else(|| {
            Error::UnrecognizedRole(claims.role.clone().unwrap_or_else(|| "<absent>".to_string()))
        })?;

        let path = match role {
            Role::Student => &self.config.student_profile_path,
            Role::Admin => &self.config.admin_profile_path,
        };
        debug!(%role, %path, "Fetching profile");

        // Authorized, but deliberately outside the 401 retry loop: a 401
        // here during a refresh is a refresh failure, not a new trigger.
        let request = self.authorize(self.http.get(self.endpoint(path))).await;
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus(response.status()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::InvalidProfileShape(e.to_string()))?;

        let identity = Identity::from_profile_response(role, body)?;
        self.session.set_identity(identity.clone()).await?;

        Ok(identity)
    }
}
