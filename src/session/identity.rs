//! Identity models

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of roles the portal recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Student account
    Student,
    /// Administrator account
    Admin,
}

impl Role {
    /// Map a raw role claim onto the recognized set.
    ///
    /// Any other value (including an empty string) is unrecognized.
    pub fn from_claim(value: &str) -> Option<Self> {
        match value {
            "STUDENT" => Some(Role::Student),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "STUDENT"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Profile fields shared by both roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub birth_date: chrono::NaiveDate,
    pub email: String,
    pub role: Role,
}

/// The resolved user identity, replaced wholesale on every profile fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Identity {
    Student {
        student_id: String,
        year_level: u32,
        profile: Profile,
    },
    Admin {
        profile: Profile,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<String>,
    },
}

impl Identity {
    pub fn role(&self) -> Role {
        match self {
            Identity::Student { .. } => Role::Student,
            Identity::Admin { .. } => Role::Admin,
        }
    }

    pub fn profile(&self) -> &Profile {
        match self {
            Identity::Student { profile, .. } => profile,
            Identity::Admin { profile, .. } => profile,
        }
    }

    /// Validate a raw profile response body and normalize it into an
    /// `Identity` tagged with the role from the token claims.
    ///
    /// The embedded profile's role must agree with the claimed role; a
    /// mismatch means the token and the profile resource describe different
    /// accounts and the response is rejected.
    pub fn from_profile_response(role: Role, body: serde_json::Value) -> Result<Identity> {
        let identity = match role {
            Role::Student => {
                let response: StudentProfileResponse = serde_json::from_value(body)
                    .map_err(|e| Error::InvalidProfileShape(e.to_string()))?;
                if response.student_id.trim().is_empty() {
                    return Err(Error::InvalidProfileShape(
                        "empty student identifier".to_string(),
                    ));
                }
                Identity::Student {
                    student_id: response.student_id,
                    year_level: response.year_level,
                    profile: response.user,
                }
            }
            Role::Admin => {
                let response: AdminProfileResponse = serde_json::from_value(body)
                    .map_err(|e| Error::InvalidProfileShape(e.to_string()))?;
                Identity::Admin {
                    profile: response.user,
                    position: response.position,
                }
            }
        };

        if identity.profile().role != role {
            return Err(Error::InvalidProfileShape(format!(
                "profile role {} does not match token role {}",
                identity.profile().role,
                role
            )));
        }

        Ok(identity)
    }
}

/// Raw student profile response from the server
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudentProfileResponse {
    student_id: String,
    year_level: u32,
    user: Profile,
}

/// Raw admin profile response from the server
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminProfileResponse {
    user: Profile,
    #[serde(default)]
    position: Option<String>,
}
