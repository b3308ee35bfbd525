//! Portal client - authenticated session management for the student portal API
//!
//! This is the library interface for the portal client: the session store,
//! token inspection, profile resolution, and the 401-triggered refresh
//! coordination that the CLI (and any other consumer) builds on.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod token;

pub use client::ApiClient;
pub use config::Config;
pub use error::{Error, Result};
pub use session::{Identity, Role, SessionStore};
