//! Configuration management for the highlight store

use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig {
                url: "sqlite:./highlights.db".to_string(),
                max_connections: 5,
            },
        }
    }
}

impl Config {
    /// Load configuration from a `.env` file (if present) and the environment
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Self {
        Config {
            database: DatabaseConfig {
                url: env::var("HIGHLIGHTS_DATABASE_URL")
                    .or_else(|_| env::var("DATABASE_URL"))
                    .unwrap_or_else(|_| "sqlite:./highlights.db".to_string()),
                max_connections: env::var("HIGHLIGHTS_DB_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            },
        }
    }
}
