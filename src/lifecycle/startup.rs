//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Bind the listener and serve until shutdown
//! - Release resources (database pool) on every exit path
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::net::{AddrParseError, IpAddr, SocketAddr};

use thiserror::Error;

use crate::app::App;
use crate::config::AppConfig;
use crate::db::{Database, DatabaseError};
use crate::http::{RunError, Server, ServerError};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid listener host: {0}")]
    Host(#[from] AddrParseError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Run(#[from] RunError),
}

/// Run the service until `shutdown` fires and the server has drained.
pub async fn run(config: AppConfig, shutdown: ShutdownSignal) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let db = if config.database.enabled {
        Some(connect_database(&config).await?)
    } else {
        tracing::info!("Database disabled");
        None
    };

    let result = serve(&config, db.clone(), shutdown).await;

    if let Some(db) = db {
        db.close().await;
    }
    result
}

/// Open the pool and confirm the server answers before taking traffic.
async fn connect_database(config: &AppConfig) -> Result<Database, DatabaseError> {
    let db = Database::connect(&config.database).await?;
    if let Err(e) = db.ping().await {
        db.close().await;
        return Err(e);
    }
    tracing::info!(dsn = %config.database.dsn(), "Database connected");
    Ok(db)
}

async fn serve(
    config: &AppConfig,
    db: Option<Database>,
    shutdown: ShutdownSignal,
) -> Result<(), StartupError> {
    let ip: IpAddr = config.listener.host.parse()?;
    let app = App::new(db);

    let mut server = Server::bind(SocketAddr::new(ip, config.listener.port))
        .await?
        .with_read_header_timeout(config.timeouts.read_header());

    tracing::info!(
        address = %server.addr(),
        port = server.port(),
        shutdown_timeout = ?config.timeouts.shutdown(),
        "Server listening"
    );

    server
        .serve(shutdown.recv(), app.routes(), config.timeouts.shutdown())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;

    #[tokio::test]
    async fn already_triggered_shutdown_exits_cleanly() {
        let mut config = AppConfig::default();
        config.listener.host = "127.0.0.1".into();
        config.listener.port = 0;

        let shutdown = Shutdown::new();
        shutdown.trigger();

        run(config, shutdown.subscribe()).await.unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = AppConfig::default();
        config.listener.host = "127.0.0.1".into();
        config.listener.port = taken.local_addr().unwrap().port();

        let err = run(config, Shutdown::new().subscribe()).await.unwrap_err();
        assert!(matches!(err, StartupError::Server(ServerError::Bind(_))));
    }

    #[tokio::test]
    async fn unreachable_database_aborts_startup() {
        let mut config = AppConfig::default();
        config.listener.host = "127.0.0.1".into();
        config.listener.port = 0;
        config.database.enabled = true;
        config.database.host = "127.0.0.1".into();
        config.database.port = 1;
        config.database.user = "app".into();
        config.database.connect_timeout_secs = 1;

        let shutdown = Shutdown::new();
        let err = run(config, shutdown.subscribe()).await.unwrap_err();
        assert!(matches!(
            err,
            StartupError::Database(DatabaseError::Connect { .. })
        ));
        assert!(!shutdown.is_triggered());
    }
}
