//! Application configuration

use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Interface to bind
    pub server_host: String,
    /// HTTP/WebSocket server port
    pub server_port: u16,

    /// CORS allowed origins (comma-separated, or "*" for any). Empty disables CORS.
    pub cors_allowed_origins: Vec<String>,

    pub storage: StorageConfig,

    /// JSON seed with event definitions and campaign configs
    pub catalog_path: Option<String>,

    /// Relay used when a game table registers without its own endpoint
    pub game_table_relay_url: Option<String>,

    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageBackend::Memory),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => bail!("unknown storage backend '{other}' (expected memory or sqlite)"),
        }
    }
}

/// Instance and cooldown storage
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// SQLite database path (if using sqlite backend)
    pub sqlite_path: String,
}

/// Limits for probes and background work
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub health_probe_timeout: Duration,
    /// Max concurrent fire-and-forget tasks
    pub background_task_limit: usize,
    /// Lifecycle events buffered per overlay subscriber
    pub broadcast_capacity: usize,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            storage: StorageConfig {
                backend: env::var("STORAGE_BACKEND")
                    .unwrap_or_else(|_| "memory".to_string())
                    .parse()
                    .context("STORAGE_BACKEND is invalid")?,
                sqlite_path: env::var("SQLITE_PATH")
                    .unwrap_or_else(|_| "./data/critcast.db".to_string()),
            },

            catalog_path: non_empty_var("CATALOG_PATH"),
            game_table_relay_url: non_empty_var("GAME_TABLE_RELAY_URL"),

            runtime: RuntimeConfig {
                health_probe_timeout: Duration::from_secs(
                    env::var("HEALTH_PROBE_TIMEOUT_SECONDS")
                        .unwrap_or_else(|_| "10".to_string())
                        .parse()
                        .unwrap_or(10),
                ),
                background_task_limit: env::var("BACKGROUND_TASK_LIMIT")
                    .unwrap_or_else(|_| "32".to_string())
                    .parse()
                    .unwrap_or(32),
                broadcast_capacity: env::var("BROADCAST_CAPACITY")
                    .unwrap_or_else(|_| "256".to_string())
                    .parse()
                    .unwrap_or(256),
            },
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_case_insensitively() {
        assert_eq!(
            "SQLite".parse::<StorageBackend>().unwrap(),
            StorageBackend::Sqlite
        );
        assert_eq!(
            " memory ".parse::<StorageBackend>().unwrap(),
            StorageBackend::Memory
        );
        assert!("postgres".parse::<StorageBackend>().is_err());
    }
}
