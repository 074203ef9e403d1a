use anyhow::Result;
use chat_socket::TargetType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;
mod config;

use config::Settings;

#[derive(Parser)]
#[command(name = "chat", about = "Chat CLI - Send and receive chat messages")]
#[command(version, propagate_version = true)]
struct Cli {
    /// Path to configuration file (default: ~/.chat-socket/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base address of the real-time API
    #[arg(long, env = "CHAT_WEBSOCKET_API", global = true)]
    websocket_api: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the authentication token used for chat connections
    Login,

    /// Remove the stored token
    Logout,

    /// Open an interactive chat session
    Connect {
        /// Your user ID; your own messages are not echoed back
        #[arg(short, long)]
        user_id: i64,

        /// Recipient user or group ID
        #[arg(short, long)]
        to: i64,

        /// Address a group instead of a single user
        #[arg(short, long)]
        group: bool,
    },

    /// Send a single message
    Send {
        /// Your user ID
        #[arg(short, long)]
        user_id: i64,

        /// Recipient user or group ID
        #[arg(short, long)]
        to: i64,

        /// Address a group instead of a single user
        #[arg(short, long)]
        group: bool,

        /// Message text
        message: String,
    },
}

fn target_type(group: bool) -> TargetType {
    if group {
        TargetType::Group
    } else {
        TargetType::Direct
    }
}

fn init_logging(level: &str, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config, cli.websocket_api)?;
    init_logging(&settings.config.logging.level, cli.verbose)?;

    match cli.command {
        Commands::Login => commands::login::run(&settings),
        Commands::Logout => commands::logout::run(&settings),
        Commands::Connect { user_id, to, group } => {
            commands::connect::run(&settings, user_id, to, target_type(group)).await
        }
        Commands::Send {
            user_id,
            to,
            group,
            message,
        } => commands::send::run(&settings, user_id, to, target_type(group), &message).await,
    }
}
