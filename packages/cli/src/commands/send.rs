use anyhow::{bail, Result};
use chat_socket::{MessageStore, TargetType};
use colored::Colorize;

use crate::config::Settings;

/// Send a single message and disconnect
pub async fn run(
    settings: &Settings,
    user_id: i64,
    target: i64,
    target_type: TargetType,
    message: &str,
) -> Result<()> {
    let manager = settings.connection_manager(MessageStore::new())?;
    let conn = manager.create_connection(user_id);

    if !conn.wait_until_settled().await {
        bail!("Could not connect to {}", settings.config.websocket_api);
    }

    let sent = conn.send(message, target, target_type);
    conn.close();
    conn.closed().await;

    if !sent {
        bail!("Message was not sent");
    }

    println!(
        "{} Sent to {} {}",
        "✓".green().bold(),
        target_type,
        target
    );
    Ok(())
}
