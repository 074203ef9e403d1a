//! CLI Configuration
//!
//! Resolves the client configuration from ~/.chat-socket/config.toml (or an
//! explicit path) and command-line overrides.

use anyhow::{Context, Result};
use chat_socket::{ClientConfig, ConnectionManager, FileStorage, MessageStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Settings shared by every command
pub struct Settings {
    pub config: ClientConfig,
}

impl Settings {
    /// Load config from disk and apply overrides
    pub fn load(path: Option<PathBuf>, websocket_api: Option<String>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => ClientConfig::default_path()?,
        };
        let mut config = ClientConfig::load(&path)
            .with_context(|| format!("Failed to load config at {}", path.display()))?;

        if let Some(url) = websocket_api {
            config.websocket_api = url;
        }

        Ok(Self { config })
    }

    /// Open the local storage holding the token
    pub fn storage(&self) -> Result<FileStorage> {
        self.config
            .storage()
            .context("Could not open local storage")
    }

    /// Connection manager for the configured server, writing into `store`
    pub fn connection_manager(&self, store: MessageStore) -> Result<ConnectionManager<FileStorage>> {
        let storage = Arc::new(self.storage()?);
        Ok(
            ConnectionManager::new(self.config.websocket_api.as_str(), storage, store)
                .with_connect_timeout(self.config.connect_timeout()),
        )
    }
}
