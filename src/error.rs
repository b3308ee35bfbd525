//! Error types for the portal client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found. Run 'portal init' first.")]
    ConfigNotFound,

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Access token is malformed")]
    MalformedToken,

    #[error("Access token has expired")]
    TokenExpired,

    #[error("Unrecognized role claim: {0}")]
    UnrecognizedRole(String),

    #[error("Profile response has an invalid shape: {0}")]
    InvalidProfileShape(String),

    #[error("No access token held in the session")]
    NoToken,

    #[error("Refresh succeeded but returned no access token")]
    NoAccessTokenReturned,

    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Server returned unexpected status: {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
