//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config.

use anyhow::Result;
use std::env;
use uuid::Uuid;

/// Which Remote Store implementation backs the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreProvider {
    /// PostgreSQL (the Supabase database) through sqlx
    Postgres,
    /// In-memory store, for local development and tests
    #[default]
    Mock,
}

impl std::str::FromStr for StoreProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "postgres" => Ok(StoreProvider::Postgres),
            "mock" => Ok(StoreProvider::Mock),
            other => Err(anyhow::anyhow!(
                "Unknown store provider: {}. Supported providers: postgres, mock",
                other
            )),
        }
    }
}

impl std::fmt::Display for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreProvider::Postgres => write!(f, "postgres"),
            StoreProvider::Mock => write!(f, "mock"),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    /// Remote Store backend
    pub store_provider: StoreProvider,

    /// Database connection URL (Supabase PostgreSQL), required for the postgres store
    pub database_url: Option<String>,

    /// Signed-in user; assistant and user messages are attributed to it
    pub user_id: Option<Uuid>,

    /// Runtime configuration
    pub rust_log: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("store_provider", &self.store_provider)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("user_id", &self.user_id)
            .field("rust_log", &self.rust_log)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let store_provider = match env::var("STORE_PROVIDER") {
            Ok(value) => value.parse()?,
            Err(_) => StoreProvider::default(),
        };

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if store_provider == StoreProvider::Postgres && database_url.is_none() {
            return Err(anyhow::anyhow!(
                "DATABASE_URL is required for the postgres store"
            ));
        }

        let user_id = match env::var("PARLEY_USER_ID") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                Uuid::parse_str(raw.trim())
                    .map_err(|e| anyhow::anyhow!("PARLEY_USER_ID is not a valid UUID: {}", e))?,
            ),
            _ => None,
        };

        let config = Self {
            store_provider,
            database_url,
            user_id,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "parley=debug".to_string()),
        };

        tracing::debug!(config = ?config, "Configuration loaded");

        Ok(config)
    }
}
