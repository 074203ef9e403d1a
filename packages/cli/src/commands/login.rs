use anyhow::{bail, Context, Result};
use chat_socket::{LocalStorage, TOKEN_KEY};
use colored::Colorize;
use dialoguer::Password;

use crate::config::Settings;

/// Handle the login command
pub fn run(settings: &Settings) -> Result<()> {
    println!("{}", "Chat Login".bold());
    println!();

    let token: String = Password::new()
        .with_prompt("API Token")
        .allow_empty_password(true)
        .interact()?;

    if token.is_empty() {
        bail!("Token cannot be empty");
    }

    let storage = settings.storage()?;
    storage
        .set_item(TOKEN_KEY, &token)
        .context("Failed to save token")?;

    println!();
    println!(
        "{} Token saved for {}",
        "✓".green().bold(),
        settings.config.websocket_api
    );
    println!(
        "  Stored in {}",
        storage.path().display().to_string().dimmed()
    );

    Ok(())
}
