//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use api_server::http::{RunError, Server};
use api_server::lifecycle::Shutdown;
use axum::Router;
use tokio::task::JoinHandle;

/// A server running on a background task.
#[allow(dead_code)]
pub struct Running {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<(Server, Result<(), RunError>)>,
}

impl Running {
    /// Trigger shutdown and wait for `serve` to return.
    #[allow(dead_code)]
    pub async fn stop(self) -> (Server, Result<(), RunError>) {
        self.shutdown.trigger();
        self.join().await
    }

    pub async fn join(self) -> (Server, Result<(), RunError>) {
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("serve did not return")
            .expect("serve task panicked")
    }
}

/// Bind an ephemeral loopback port and serve `app` on a background task.
#[allow(dead_code)]
pub async fn start(app: Router, shutdown_timeout: Duration) -> Running {
    let server = Server::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    start_server(server, app, shutdown_timeout)
}

pub fn start_server(mut server: Server, app: Router, shutdown_timeout: Duration) -> Running {
    let addr = loopback(&server);
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    let task = tokio::spawn(async move {
        let result = server.serve(signal.recv(), app, shutdown_timeout).await;
        (server, result)
    });

    Running {
        addr,
        shutdown,
        task,
    }
}

/// Dialable loopback address for a server bound to any interface.
pub fn loopback(server: &Server) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], server.port()))
}

/// Client without connection pooling or proxies, so each request dials fresh.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// True if a TCP connection to `addr` is refused.
#[allow(dead_code)]
pub async fn is_closed(addr: SocketAddr) -> bool {
    tokio::net::TcpStream::connect(addr).await.is_err()
}
