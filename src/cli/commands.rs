//! CLI command implementations

use anyhow::Result;
use std::fs;

use crate::cli::{error, info, print_identity, success, warn};
use crate::client::ApiClient;
use crate::config::{self, Config};

/// Initialize a new portal.toml configuration file
pub async fn init() -> Result<()> {
    let config_path = std::path::Path::new("portal.toml");

    if config_path.exists() {
        warn("portal.toml already exists");
        return Ok(());
    }

    let content = config::loader::default_config_content();
    fs::write(config_path, content)?;

    success("Created portal.toml");
    info("Edit the configuration file and run 'portal login' to sign in");

    Ok(())
}

/// Log in to the portal
pub async fn login(username: Option<String>) -> Result<()> {
    let config = load_config()?;
    let client = ApiClient::new(&config)?;

    let username = match username {
        Some(username) => username,
        None => dialoguer::Input::new().with_prompt("Username").interact_text()?,
    };
    let password = dialoguer::Password::new().with_prompt("Password").interact()?;

    match client.login(&username, &password).await {
        Ok(identity) => {
            success(&format!("Logged in as {}", identity.profile().username));
            print_identity(&identity);
            Ok(())
        }
        Err(e) => {
            error(&format!("Login failed: {}", e));
            Err(e.into())
        }
    }
}

/// Show the currently signed-in identity
pub async fn whoami() -> Result<()> {
    let config = load_config()?;
    let client = ApiClient::new(&config)?;

    if !client.restore_session().await? {
        warn("Not signed in");
        return Ok(());
    }

    let snapshot = client.snapshot().await;
    match snapshot.identity {
        Some(identity) => print_identity(&identity),
        None => warn("Not signed in"),
    }
    Ok(())
}

/// Show session status
pub async fn status() -> Result<()> {
    let config = load_config()?;
    let client = ApiClient::new(&config)?;
    let usable = client.restore_session().await?;
    let snapshot = client.snapshot().await;

    if usable {
        success("Session is active");
    } else if snapshot.session_expired {
        warn("Session expired, please log in again");
    } else {
        info("Not signed in");
    }
    Ok(())
}

/// Log out and clear the local session
pub async fn logout() -> Result<()> {
    let config = load_config()?;
    let client = ApiClient::new(&config)?;
    client.restore_session().await.ok();
    client.logout().await?;
    success("Logged out");
    Ok(())
}

fn load_config() -> Result<Config> {
    Ok(config::load_config()?)
}
