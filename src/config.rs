// Runtime configuration loaded from the environment

use anyhow::{anyhow, Context, Result};

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub max_connections: u32,
    pub log_format: LogFormat,
}

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow!("DATABASE_URL must be set in environment"))?;

        let server_port = match lookup("PORT") {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("invalid PORT: {}", port))?,
            None => DEFAULT_PORT,
        };

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(value) => {
                let parsed = value
                    .parse::<u32>()
                    .with_context(|| format!("invalid DB_MAX_CONNECTIONS: {}", value))?;
                if parsed == 0 {
                    return Err(anyhow!("DB_MAX_CONNECTIONS must be at least 1"));
                }
                parsed
            }
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(anyhow!("unknown LOG_FORMAT: {}", other)),
        };

        Ok(Self {
            database_url,
            server_port,
            max_connections,
            log_format,
        })
    }
}
