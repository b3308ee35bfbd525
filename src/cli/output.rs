//! CLI output formatting utilities

use colored::Colorize;

use crate::session::Identity;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn warn(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

/// Print the resolved identity
pub fn print_identity(identity: &Identity) {
    let profile = identity.profile();
    let name = match &profile.middle_name {
        Some(middle) => format!("{} {} {}", profile.first_name, middle, profile.last_name),
        None => format!("{} {}", profile.first_name, profile.last_name),
    };

    println!("{}  {}", name.bold(), format!("<{}>", profile.email).dimmed());
    println!("  username: {}", profile.username);
    match identity {
        Identity::Student {
            student_id,
            year_level,
            ..
        } => {
            println!("  role:     {}", "STUDENT".cyan());
            println!("  student:  {} (year {})", student_id, year_level);
        }
        Identity::Admin { position, .. } => {
            println!("  role:     {}", "ADMIN".magenta());
            if let Some(position) = position {
                println!("  position: {}", position);
            }
        }
    }
}
