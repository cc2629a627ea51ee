//! Application configuration
//!
//! Loaded once at startup from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::database::DatabaseConfig;
use crate::layers::HttpConfig;
use crate::observability::ObservabilityConfig;
use crate::session::SessionPolicy;

/// Where clinic data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// PostgreSQL (production)
    #[default]
    Postgres,
    /// Process memory, lost on restart (development)
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => anyhow::bail!("unknown store backend '{}'", other),
        }
    }
}

/// Everything the server needs to boot.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub backend: StoreBackend,
    pub database: DatabaseConfig,
    pub session: SessionPolicy,
    pub http: HttpConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// - `BIND_ADDR`: listen address (default: "0.0.0.0:5000")
    /// - `STORE_BACKEND`: "postgres" or "memory" (default: "postgres")
    ///
    /// Database, session, HTTP and logging settings are read by their own
    /// `from_env` constructors.
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:5000".into())
            .parse()
            .context("Invalid BIND_ADDR")?;

        let backend = match std::env::var("STORE_BACKEND") {
            Ok(value) => value.parse().context("Invalid STORE_BACKEND")?,
            Err(_) => StoreBackend::default(),
        };

        Ok(Self {
            bind_addr,
            backend,
            database: DatabaseConfig::from_env(),
            session: SessionPolicy::from_env(),
            http: HttpConfig::from_env(),
            observability: ObservabilityConfig::from_env(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert_eq!(" Memory ".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_default_backend_is_postgres() {
        assert_eq!(StoreBackend::default(), StoreBackend::Postgres);
    }
}
