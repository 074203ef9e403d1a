use anyhow::{Context, Result};
use chat_socket::{LocalStorage, TOKEN_KEY};
use colored::Colorize;

use crate::config::Settings;

/// Remove the stored token
pub fn run(settings: &Settings) -> Result<()> {
    settings
        .storage()?
        .remove_item(TOKEN_KEY)
        .context("Failed to remove token")?;

    println!("{} Logged out", "✓".green().bold());
    Ok(())
}
