//! Request middleware.
//!
//! # Order (outermost first)
//! ```text
//! recovery.rs   catch panics → JSON 500
//! request.rs    assign RequestContext / x-request-id
//! logger.rs     request span, access log, request metrics
//! handler
//! ```

pub mod logger;
pub mod recovery;

pub use logger::trace_request;
