//! CLI interface for the portal client

pub mod commands;
mod output;

pub use output::*;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "portal")]
#[command(version = "1.0.0")]
#[command(about = "Student portal API client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new portal.toml configuration file
    Init,

    /// Log in to the portal
    Login {
        /// Username (prompted for if omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Show the currently signed-in identity
    Whoami,

    /// Show session status
    Status,

    /// Log out and clear the local session
    Logout,
}
