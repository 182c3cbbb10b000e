//! MySQL connection pool.
//!
//! # Responsibilities
//! - Build connect options from `DatabaseConfig`
//! - Own the pooled handle shared by request handlers
//! - Report pool statistics for the status endpoint
//!
//! # Design Decisions
//! - Passwords never appear in logs; `dsn()` redacts them
//! - Connection failures at startup are fatal; the pool retries internally
//!   only within `connect_timeout_secs`

use std::time::Duration;

use serde::Serialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use thiserror::Error;
use url::Url;

use crate::config::DatabaseConfig;

const CHARSET: &str = "utf8";
const COLLATION: &str = "utf8_general_ci";

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("unable to connect to mysql at {dsn}: {source}")]
    Connect {
        dsn: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("mysql health check failed: {0}")]
    Ping(#[source] sqlx::Error),
}

impl DatabaseConfig {
    /// Driver options for this configuration.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.schema)
            .charset(CHARSET)
            .collation(COLLATION)
    }

    /// Connection string with the password redacted, for logs.
    pub fn dsn(&self) -> String {
        let redacted = (!self.password.is_empty()).then_some("***");
        match Url::parse(&format!("mysql://{}:{}", self.host, self.port)) {
            Ok(mut url) => {
                // Both setters only fail for cannot-be-a-base URLs, which mysql:// never is.
                let _ = url.set_username(&self.user);
                let _ = url.set_password(redacted);
                url.set_path(&format!("/{}", self.schema));
                url.query_pairs_mut()
                    .append_pair("charset", CHARSET)
                    .append_pair("collation", COLLATION);
                url.to_string()
            }
            Err(_) => format!("mysql://{}@{}:{}/{}", self.user, self.host, self.port, self.schema),
        }
    }

    fn pool_options(&self) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .max_connections(self.max_open_conns)
            .min_connections(self.min_idle_conns)
            .idle_timeout(Duration::from_secs(self.max_idle_secs))
            .max_lifetime(Duration::from_secs(self.max_lifetime_secs))
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
    }
}

/// Point-in-time pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub max_open_connections: u32,
    pub open_connections: u32,
    pub in_use: u32,
    pub idle: u32,
}

/// Pooled database handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: MySqlPool,
}

impl Database {
    /// Open the pool and establish the first connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let dsn = config.dsn();
        tracing::info!(dsn = %dsn, "Connecting to mysql");

        let pool = config
            .pool_options()
            .connect_with(config.connect_options())
            .await
            .map_err(|source| DatabaseError::Connect { dsn, source })?;

        Ok(Self { pool })
    }

    /// Create the pool without connecting; connections open on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let pool = config.pool_options().connect_lazy_with(config.connect_options());
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        let open = self.pool.size();
        let idle = u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX);
        PoolStats {
            max_open_connections: self.pool.options().get_max_connections(),
            open_connections: open,
            in_use: open.saturating_sub(idle),
            idle,
        }
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(DatabaseError::Ping)
    }

    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("mysql pool closed");
    }
}
