//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, hyper connection, graceful drain)
//!     → middleware/recovery.rs (panic boundary)
//!     → request.rs (request ID, RequestContext)
//!     → middleware/logger.rs (request span, metrics)
//!     → application handler
//!     → response.rs (JSON errors)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, RequestId, RequestIdExt, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{RunError, Server, ServerError, ShutdownError, DEFAULT_SHUTDOWN_TIMEOUT};
