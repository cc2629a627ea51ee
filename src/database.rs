//! PostgreSQL connection provider.
//!
//! Builds the shared connection pool from environment configuration. Every
//! pooled connection autocommits and runs at READ COMMITTED isolation.
//!
//! When the configured host is the symbolic container name (`bd`), a short
//! TCP probe against `localhost` decides whether a local database is running,
//! so the same configuration works inside and outside the container network.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{Executor, PgPool};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::parse::parse_duration;

/// Host name used by the container deployment.
pub const DEFAULT_DB_HOST: &str = "bd";

/// Upper bound on the local database probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

const ISOLATION_STATEMENT: &str =
    "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL READ COMMITTED";

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Server host (after [`DatabaseConfig::with_resolved_host`], the probed host)
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,

    /// Maximum pooled connections
    /// Default: 10
    pub max_connections: u32,

    /// Maximum wait for a pooled connection
    /// Default: 5 seconds
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: 5432,
            database: "DMN-pec1".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl DatabaseConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DB_HOST`: server host (default: "bd")
    /// - `DB_NAME`: database name (default: "DMN-pec1")
    /// - `DB_USER`: user (default: "postgres")
    /// - `DB_PASSWORD`: password (default: "postgres")
    /// - `DB_PORT`: port (default: 5432)
    /// - `DB_MAX_CONNECTIONS`: pool size (default: 10)
    /// - `DB_ACQUIRE_TIMEOUT`: e.g. "5s" (default: "5s")
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: std::env::var("DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            database: std::env::var("DB_NAME").unwrap_or(defaults.database),
            user: std::env::var("DB_USER").unwrap_or(defaults.user),
            password: std::env::var("DB_PASSWORD").unwrap_or(defaults.password),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_connections),
            acquire_timeout: std::env::var("DB_ACQUIRE_TIMEOUT")
                .ok()
                .and_then(|s| parse_duration(&s))
                .unwrap_or(defaults.acquire_timeout),
        }
    }

    /// Replace the host with the result of [`resolve_host`].
    pub async fn with_resolved_host(mut self) -> Self {
        self.host = resolve_host(&self.host, self.port).await;
        self
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(PgSslMode::Prefer)
    }
}

/// Pick the database host.
///
/// Only the symbolic default is probed: if something accepts TCP on
/// `localhost:<port>` within [`PROBE_TIMEOUT`], `localhost` wins. A refused
/// connection, resolution failure or timeout all keep the symbolic host.
pub async fn resolve_host(host: &str, port: u16) -> String {
    if host != DEFAULT_DB_HOST {
        return host.to_string();
    }

    match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(("localhost", port))).await {
        Ok(Ok(_)) => {
            info!(port, "Local database detected, using localhost");
            "localhost".to_string()
        }
        Ok(Err(e)) => {
            debug!(port, error = %e, "Local database probe refused");
            host.to_string()
        }
        Err(_) => {
            debug!(port, "Local database probe timed out");
            host.to_string()
        }
    }
}

/// Create the connection pool.
///
/// The pool connects lazily, so the server starts even while the database is
/// down; requests then observe connection errors instead of the process
/// failing at boot.
pub fn create_pool(config: &DatabaseConfig) -> PgPool {
    info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        max_connections = config.max_connections,
        "Initializing database connection pool"
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute(ISOLATION_STATEMENT).await?;
                Ok(())
            })
        })
        .connect_lazy_with(config.connect_options())
}

/// Run a trivial query to confirm the database answers.
pub async fn health_check(pool: &PgPool) -> Result<HealthStatus, DatabaseError> {
    let start = Instant::now();

    let result: (i32,) = sqlx::query_as("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| DatabaseError::HealthCheck(format!("Query failed: {}", e)))?;

    if result.0 != 1 {
        return Err(DatabaseError::HealthCheck("Unexpected query result".into()));
    }

    let status = HealthStatus {
        latency: start.elapsed(),
        pool_size: pool.size(),
        idle_connections: pool.num_idle() as u32,
    };

    debug!(latency_ms = ?status.latency.as_millis(), "Database health check passed");

    Ok(status)
}

/// Result of a successful [`health_check`].
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub latency: Duration,
    pub pool_size: u32,
    pub idle_connections: u32,
}

/// Connection-provider errors
#[derive(Debug)]
pub enum DatabaseError {
    /// Health check query failed
    HealthCheck(String),
}

impl std::fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HealthCheck(msg) => write!(f, "Database health check failed: {}", msg),
        }
    }
}

impl std::error::Error for DatabaseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_defaults_match_container_deployment() {
        let config = DatabaseConfig::default();
        assert_eq!(config.host, "bd");
        assert_eq!(config.port, 5432);
        assert_eq!(config.database, "DMN-pec1");
        assert_eq!(config.user, "postgres");
    }

    #[tokio::test]
    async fn test_explicit_host_is_not_probed() {
        assert_eq!(resolve_host("db.internal", 5432).await, "db.internal");
        assert_eq!(resolve_host("localhost", 1).await, "localhost");
    }

    #[tokio::test]
    async fn test_probe_prefers_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert_eq!(resolve_host(DEFAULT_DB_HOST, port).await, "localhost");
    }

    #[tokio::test]
    async fn test_probe_falls_back_when_nothing_listens() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        assert_eq!(resolve_host(DEFAULT_DB_HOST, port).await, DEFAULT_DB_HOST);
    }
}
