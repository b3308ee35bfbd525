//! Access token inspection
//!
//! Decodes JWT claims without verifying the signature. Verification is the
//! server's job; decoded claims only gate whether a profile fetch is worth
//! attempting, they never authorize anything by themselves.

use crate::error::{Error, Result};
use crate::session::Role;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried in the portal's access tokens
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Option<String>,
    /// Username
    pub username: Option<String>,
    /// Role claim ("STUDENT" or "ADMIN")
    pub role: Option<String>,
    /// Student number, present on student tokens
    pub student_id: Option<String>,
    /// Year level, present on student tokens
    pub year_level: Option<u32>,
    /// Profile record ID
    pub profile_id: Option<String>,
    /// Issued at
    pub iat: Option<i64>,
    /// Expiration time
    pub exp: Option<i64>,
}

impl Claims {
    /// The role claim mapped onto the recognized role set.
    ///
    /// Returns `None` for an absent claim or any value outside the closed
    /// set, which callers must treat as a failed role check.
    pub fn recognized_role(&self) -> Option<Role> {
        self.role.as_deref().and_then(Role::from_claim)
    }

    /// Check the expiry claim against a wall-clock Unix timestamp.
    ///
    /// A token without an `exp` claim is treated as not expired; the server
    /// remains the authority and will reject it if it disagrees.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.exp, Some(exp) if exp < now)
    }
}

/// Decode a token's payload segment without verifying its signature
pub fn decode_unverified(token: &str) -> Result<Claims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|_| Error::MalformedToken)
}
