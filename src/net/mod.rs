//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Server construction
//!     → listener.rs (eager bind, resolve OS-assigned port)
//!
//! Serve loop
//!     → listener.rs (accept)
//!     → connection.rs (lifecycle tracking while the connection is open)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Binding happens before serving so startup errors are synchronous
//! - Each connection tracked so a stalled drain can report what is left

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{BindError, Listener};
