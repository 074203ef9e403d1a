use anyhow::{bail, Result};
use chat_socket::{MessageStore, TargetType};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Settings;

/// Print an inbound frame; the store's initial empty value is skipped
pub fn print_message(frame: &str) {
    if frame.is_empty() {
        return;
    }
    let ts = chrono::Local::now().format("%H:%M:%S").to_string();
    println!("{} {}", ts.dimmed(), frame);
}

/// Interactive chat session: stdin lines are sent to `target`, messages from
/// other users are printed as they arrive
pub async fn run(
    settings: &Settings,
    user_id: i64,
    target: i64,
    target_type: TargetType,
) -> Result<()> {
    let store = MessageStore::new();
    let _printer = store.subscribe(print_message);

    let manager = settings.connection_manager(store)?;
    let conn = manager.create_connection(user_id);

    println!(
        "Connecting to {} as user {}...",
        settings.config.websocket_api.cyan(),
        user_id.to_string().bold()
    );
    if !conn.wait_until_settled().await {
        bail!("Could not connect to {}", settings.config.websocket_api);
    }

    println!(
        "{} Connected. Messages go to {} {}. Press Ctrl-D to quit.",
        "✓".green().bold(),
        target_type,
        target
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.is_empty() => continue,
                    Some(line) => {
                        if !conn.send(&line, target, target_type) {
                            println!("{}", "Message not sent: connection is closing".yellow());
                        }
                    }
                    None => break,
                }
            }
            _ = conn.closed() => {
                println!("{}", "Connection closed by server.".yellow());
                return Ok(());
            }
        }
    }

    conn.close();
    conn.closed().await;
    println!("{}", "Disconnected.".dimmed());
    Ok(())
}
