//! TCP listener acquisition.
//!
//! # Responsibilities
//! - Bind to the requested port eagerly, before any serving starts
//! - Resolve the OS-assigned address when port 0 is requested
//! - Accept incoming TCP connections for the serve loop
//!
//! # Design Decisions
//! - Bind failures surface to the caller of `bind`, never retried here
//! - The resolved address is captured once, at bind time

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
#[cfg(unix)]
use std::os::fd::{AsRawFd, RawFd};

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

/// The OS refused to bind or listen on the requested address.
#[derive(Debug, Error)]
#[error("failed to create listener on {addr}: {source}")]
pub struct BindError {
    addr: SocketAddr,
    #[source]
    source: io::Error,
}

impl BindError {
    /// The address that was requested.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The underlying OS error kind (e.g. `AddrInUse`).
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

/// A bound TCP listener with its resolved local address.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to `port` on all IPv4 interfaces. Port 0 lets the OS choose.
    pub async fn bind(port: u16) -> Result<Self, BindError> {
        Self::bind_addr(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).await
    }

    /// Bind to an explicit socket address.
    pub async fn bind_addr(addr: SocketAddr) -> Result<Self, BindError> {
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| BindError { addr, source })?;

        let local_addr = inner
            .local_addr()
            .map_err(|source| BindError { addr, source })?;

        tracing::info!(
            requested = %addr,
            address = %local_addr,
            "Listener bound"
        );

        Ok(Self { inner, local_addr })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer_addr) = self.inner.accept().await?;
        tracing::trace!(peer_addr = %peer_addr, "Connection accepted");
        Ok((stream, peer_addr))
    }

    /// The address the OS actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(unix)]
impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

/// Accept errors scoped to a single connection; the listener itself is still healthy.
pub(crate) fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Accept errors caused by the process or kernel running short of resources
/// (descriptors, socket buffers, memory). They clear once load drops.
pub(crate) fn is_resource_exhaustion(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::OutOfMemory || e.raw_os_error().is_some_and(is_exhaustion_errno)
}

#[cfg(unix)]
fn is_exhaustion_errno(code: i32) -> bool {
    matches!(
        code,
        libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM
    )
}

#[cfg(not(unix))]
fn is_exhaustion_errno(_code: i32) -> bool {
    false
}
