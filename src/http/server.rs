//! HTTP server lifecycle.
//!
//! # Responsibilities
//! - Own the bound listener from construction until serving stops
//! - Run the accept loop and a cancellation watcher concurrently
//! - Drain in-flight connections within a bounded deadline
//! - Report serve and shutdown failures together
//!
//! # Lifecycle
//! ```text
//! CREATED --serve--> SERVING --cancellation--> SHUTTING_DOWN --> STOPPED
//!                       \--accept loop fails------------------> STOPPED
//! ```
//!
//! The watcher task is spawned before the first `accept`, so a cancellation
//! that has already fired is observed. The drain deadline starts when the
//! watcher observes cancellation and does not depend on the signal itself.
//! The listening socket is closed before `serve` returns on every path.
//!
//! Accept errors fall into three groups: errors scoped to one connection are
//! skipped, resource exhaustion (EMFILE, ENFILE, ENOBUFS, ENOMEM) backs off
//! and retries, anything else ends the accept loop as a serve fault.

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::{extract::ConnectInfo, Router};
use hyper::{body::Incoming, Request};
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::{conn::auto::Builder, graceful::GracefulShutdown},
    service::TowerToHyperService,
};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::oneshot,
    task::{AbortHandle, JoinError},
};
use tower::ServiceExt;

use crate::net::listener::{is_connection_error, is_resource_exhaustion, BindError, Listener};
use crate::net::ConnectionTracker;
use crate::observability::metrics;

/// Time allowed for in-flight connections to finish once cancellation is observed.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for a client to send its request headers.
pub const DEFAULT_READ_HEADER_TIMEOUT: Duration = Duration::from_secs(10);

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// A failure in one phase of the server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("failed to serve: {0}")]
    Serve(#[source] io::Error),

    #[error("failed to shutdown server: {0}")]
    Shutdown(#[from] ShutdownError),

    #[error("server has already been stopped and cannot serve again")]
    Stopped,
}

/// Why the bounded drain did not finish cleanly.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("deadline of {timeout:?} exceeded with {active} connection(s) still active")]
    DeadlineExceeded { timeout: Duration, active: u64 },

    #[error("shutdown task terminated abnormally: {0}")]
    Aborted(#[from] JoinError),
}

/// Every error one `serve` call produced, in the order they happened.
#[derive(Debug, Default)]
pub struct RunError {
    errors: Vec<ServerError>,
}

impl RunError {
    pub fn errors(&self) -> &[ServerError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ServerError> {
        self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, err: ServerError) {
        self.errors.push(err);
    }

    fn into_result(self) -> Result<(), RunError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ServerError> for RunError {
    fn from(err: ServerError) -> Self {
        Self { errors: vec![err] }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.errors.as_slice() {
            [] => f.write_str("no errors"),
            [only] => write!(f, "{only}"),
            many => {
                write!(f, "{} errors occurred:", many.len())?;
                for err in many {
                    write!(f, "\n\t* {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// A bound HTTP server. Serves at most once.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    listener: Option<Listener>,
    read_header_timeout: Duration,
}

impl Server {
    /// Bind `port` on all interfaces. Port 0 lets the OS choose; the chosen
    /// port is reported by [`Server::port`].
    pub async fn new(port: u16) -> Result<Self, ServerError> {
        Ok(Self::from_listener(Listener::bind(port).await?))
    }

    /// Bind an explicit address.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        Ok(Self::from_listener(Listener::bind_addr(addr).await?))
    }

    pub fn from_listener(listener: Listener) -> Self {
        Self {
            local_addr: listener.local_addr(),
            listener: Some(listener),
            read_header_timeout: DEFAULT_READ_HEADER_TIMEOUT,
        }
    }

    pub fn with_read_header_timeout(mut self, timeout: Duration) -> Self {
        self.read_header_timeout = timeout;
        self
    }

    /// Resolved listening address (`ip:port`).
    pub fn addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn ip(&self) -> IpAddr {
        self.local_addr.ip()
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// True once `serve` has consumed the listener.
    pub fn is_stopped(&self) -> bool {
        self.listener.is_none()
    }

    /// Serve `app` with the default shutdown deadline.
    pub async fn serve_router<F>(&mut self, shutdown: F, app: Router) -> Result<(), RunError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.serve(shutdown, app, DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Serve `app` until `shutdown` resolves, then drain for up to `shutdown_timeout`.
    ///
    /// Returns once both the accept loop and the shutdown step have finished.
    /// A server can only be served once; later calls fail with
    /// [`ServerError::Stopped`].
    ///
    /// Drive the returned future to completion. Dropping it early closes the
    /// listener and stops the shutdown watcher, but connections already
    /// accepted keep running on their own tasks until their clients leave.
    pub async fn serve<F>(
        &mut self,
        shutdown: F,
        app: Router,
        shutdown_timeout: Duration,
    ) -> Result<(), RunError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.listener.take().ok_or(ServerError::Stopped)?;
        let tracker = ConnectionTracker::new();

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let (drain_tx, drain_rx) = oneshot::channel::<GracefulShutdown>();

        let watcher = tokio::spawn(watch_for_shutdown(
            shutdown,
            stop_tx,
            drain_rx,
            tracker.clone(),
            shutdown_timeout,
        ));
        let _abort_watcher = AbortOnDrop(watcher.abort_handle());

        let mut builder = Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.read_header_timeout);

        let graceful = GracefulShutdown::new();

        tracing::info!(address = %self.local_addr, "HTTP server starting");

        let mut backoff = Duration::ZERO;
        let served = loop {
            tokio::select! {
                biased;

                // Fires on cancellation, or if the watcher is gone.
                _ = &mut stop_rx => break Ok(()),

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        backoff = Duration::ZERO;
                        spawn_connection(&builder, &graceful, &tracker, &app, stream, peer_addr);
                    }
                    Err(e) if is_connection_error(&e) => {
                        tracing::debug!(error = %e, "Accept failed for one connection");
                    }
                    Err(e) if is_resource_exhaustion(&e) => {
                        backoff = next_backoff(backoff);
                        tracing::warn!(error = %e, retry_in = ?backoff, "Accept failed; retrying");
                        tokio::select! {
                            biased;
                            _ = &mut stop_rx => break Ok(()),
                            () = tokio::time::sleep(backoff) => {}
                        }
                    }
                    Err(e) => break Err(e),
                },
            }
        };

        drop(listener);
        // Only fails if the watcher already ended, in which case nothing waits on the drain.
        let _ = drain_tx.send(graceful);
        tracing::debug!("serving stopped");

        let mut outcome = RunError::default();
        if let Err(e) = served {
            tracing::error!(error = %e, "Accept loop failed");
            outcome.push(ServerError::Serve(e));
        }

        match watcher.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => outcome.push(ServerError::Shutdown(e)),
            Err(e) => outcome.push(ServerError::Shutdown(ShutdownError::Aborted(e))),
        }

        metrics::record_shutdown(if outcome.is_empty() { "clean" } else { "failed" });
        tracing::info!(
            address = %self.local_addr,
            errors = outcome.errors().len(),
            "HTTP server stopped"
        );
        outcome.into_result()
    }
}

/// Doubles from 5ms up to 1s; reset after every successful accept.
fn next_backoff(current: Duration) -> Duration {
    if current.is_zero() {
        ACCEPT_BACKOFF_MIN
    } else {
        (current * 2).min(ACCEPT_BACKOFF_MAX)
    }
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Hand one accepted connection to its own task, registered with the drain.
fn spawn_connection(
    builder: &Builder<TokioExecutor>,
    graceful: &GracefulShutdown,
    tracker: &ConnectionTracker,
    app: &Router,
    stream: TcpStream,
    peer_addr: SocketAddr,
) {
    let guard = tracker.track(peer_addr);
    let watcher = graceful.watcher();
    let builder = builder.clone();

    let service = app
        .clone()
        .map_request(move |mut request: Request<Incoming>| {
            request.extensions_mut().insert(ConnectInfo(peer_addr));
            request
        });
    let service = TowerToHyperService::new(service);

    tokio::spawn(async move {
        let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
        if let Err(e) = watcher.watch(conn).await {
            tracing::debug!(
                connection_id = %guard.id(),
                peer_addr = %guard.peer_addr(),
                error = %e,
                "Connection ended with error"
            );
        }
        drop(guard);
    });
}

/// The second unit of execution: wait for cancellation (or for the accept loop
/// to stop on its own), then drain within `timeout`.
async fn watch_for_shutdown<F>(
    shutdown: F,
    stop_tx: oneshot::Sender<()>,
    mut drain_rx: oneshot::Receiver<GracefulShutdown>,
    tracker: ConnectionTracker,
    timeout: Duration,
) -> Result<(), ShutdownError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let handed_over = tokio::select! {
        () = shutdown => {
            tracing::debug!("context closed");
            let _ = stop_tx.send(());
            None
        }
        drained = &mut drain_rx => Some(drained),
    };

    tracing::debug!("shutting down");

    let drain = async move {
        let drained = match handed_over {
            Some(drained) => drained,
            None => drain_rx.await,
        };
        if let Ok(graceful) = drained {
            graceful.shutdown().await;
        }
    };

    match tokio::time::timeout(timeout, drain).await {
        Ok(()) => {
            tracing::debug!("all connections drained");
            Ok(())
        }
        Err(_) => {
            let active = tracker.active_count();
            tracing::warn!(
                timeout = ?timeout,
                active_connections = active,
                "Shutdown deadline exceeded"
            );
            Err(ShutdownError::DeadlineExceeded { timeout, active })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_error_renders_every_error() {
        let mut outcome = RunError::default();
        outcome.push(ServerError::Serve(io::Error::other("accept exploded")));
        outcome.push(ServerError::Shutdown(ShutdownError::DeadlineExceeded {
            timeout: Duration::from_secs(5),
            active: 2,
        }));

        let rendered = outcome.to_string();
        assert!(rendered.starts_with("2 errors occurred:"));
        assert!(rendered.contains("failed to serve: accept exploded"));
        assert!(rendered.contains("failed to shutdown server: deadline of 5s exceeded with 2 connection(s)"));
    }

    #[test]
    fn empty_run_error_is_ok() {
        assert!(RunError::default().into_result().is_ok());
        let single = RunError::from(ServerError::Stopped);
        assert_eq!(single.to_string(), ServerError::Stopped.to_string());
    }

    #[test]
    fn accept_backoff_doubles_to_a_ceiling() {
        let mut backoff = Duration::ZERO;
        let mut seen = Vec::new();
        for _ in 0..10 {
            backoff = next_backoff(backoff);
            seen.push(backoff);
        }
        assert_eq!(seen[0], Duration::from_millis(5));
        assert_eq!(seen[1], Duration::from_millis(10));
        assert_eq!(seen[7], Duration::from_millis(640));
        assert_eq!(seen[8], ACCEPT_BACKOFF_MAX);
        assert_eq!(seen[9], ACCEPT_BACKOFF_MAX);
    }

    #[tokio::test]
    async fn accessors_reflect_bound_address() {
        let server = Server::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert_eq!(server.ip(), IpAddr::from([127, 0, 0, 1]));
        assert_ne!(server.port(), 0);
        assert_eq!(server.addr().to_string(), format!("127.0.0.1:{}", server.port()));
        assert!(!server.is_stopped());
    }

    #[tokio::test]
    async fn watcher_reports_deadline_when_connections_linger() {
        let tracker = ConnectionTracker::new();
        let _lingering = tracker.track("127.0.0.1:40000".parse().unwrap());

        let (stop_tx, stop_rx) = oneshot::channel();
        // The drain never receives a GracefulShutdown, so it waits out the deadline.
        let (_drain_tx, drain_rx) = oneshot::channel::<GracefulShutdown>();

        let result = watch_for_shutdown(
            std::future::ready(()),
            stop_tx,
            drain_rx,
            tracker,
            Duration::from_millis(50),
        )
        .await;

        assert!(stop_rx.await.is_ok(), "watcher tells the accept loop to stop");
        assert!(matches!(
            result,
            Err(ShutdownError::DeadlineExceeded { active: 1, .. })
        ));
    }

    #[tokio::test]
    async fn watcher_drains_when_accept_loop_stops_first() {
        let (stop_tx, _stop_rx) = oneshot::channel();
        let (drain_tx, drain_rx) = oneshot::channel();
        drain_tx.send(GracefulShutdown::new()).ok();

        let result = watch_for_shutdown(
            std::future::pending::<()>(),
            stop_tx,
            drain_rx,
            ConnectionTracker::new(),
            Duration::from_secs(1),
        )
        .await;

        assert!(result.is_ok());
    }
}
