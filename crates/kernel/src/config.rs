//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL. When unset the in-memory store is used.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Statement timeout for list queries (default: 10s).
    pub query_timeout: Duration,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Entity catalog file. `None` uses the built-in school catalog.
    pub entity_catalog: Option<PathBuf>,

    /// API token file.
    pub api_tokens_file: Option<PathBuf>,

    /// Raw admin bearer token.
    pub admin_token: Option<String>,

    /// Page size when a list request omits `pageSize` (default: 10).
    pub default_page_size: i64,

    /// Largest page size served; larger requests are capped (default: 100).
    pub max_page_size: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: None,
            database_max_connections: 10,
            query_timeout: Duration::from_secs(10),
            cors_allowed_origins: vec!["*".to_string()],
            entity_catalog: None,
            api_tokens_file: None,
            admin_token: None,
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url = non_empty("DATABASE_URL");

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let query_timeout_secs: u64 = env::var("QUERY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("QUERY_TIMEOUT_SECS must be a valid u64")?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let entity_catalog = non_empty("ENTITY_CATALOG").map(PathBuf::from);
        let api_tokens_file = non_empty("API_TOKENS_FILE").map(PathBuf::from);
        let admin_token = non_empty("ADMIN_TOKEN");

        let default_page_size = env::var("DEFAULT_PAGE_SIZE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DEFAULT_PAGE_SIZE must be a valid integer")?;

        let max_page_size = env::var("MAX_PAGE_SIZE")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .context("MAX_PAGE_SIZE must be a valid integer")?;

        let config = Self {
            port,
            database_url,
            database_max_connections,
            query_timeout: Duration::from_secs(query_timeout_secs),
            cors_allowed_origins,
            entity_catalog,
            api_tokens_file,
            admin_token,
            default_page_size,
            max_page_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.default_page_size < 1 {
            bail!("DEFAULT_PAGE_SIZE must be at least 1");
        }
        if self.max_page_size < self.default_page_size {
            bail!("MAX_PAGE_SIZE must not be smaller than DEFAULT_PAGE_SIZE");
        }
        if self.query_timeout.is_zero() {
            bail!("QUERY_TIMEOUT_SECS must be at least 1");
        }
        Ok(())
    }
}

/// Read a variable, treating an empty value as unset.
fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.database_url.is_none());
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.max_page_size, 100);
    }

    #[test]
    fn page_size_bounds_are_checked() {
        let config = Config {
            default_page_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            default_page_size: 50,
            max_page_size: 20,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
