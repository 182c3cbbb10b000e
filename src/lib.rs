//! HTTP API server library.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ net::listener ──▶ http::server ──▶ middleware ──▶ app handlers
//!                    (eager bind)      (accept loop,     (recovery,      (/status)
//!                                       drain watcher)    request ID,
//!                                                         request span)
//!
//!     lifecycle::signals ──▶ lifecycle::Shutdown ──▶ http::server (bounded drain)
//! ```
//!
//! `http::Server` is the core: it binds at construction, serves a router
//! until a cancellation future resolves, drains in-flight connections within
//! a deadline, and returns every serve and shutdown failure together.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;

// Application
pub mod app;
pub mod db;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use http::{RunError, Server, ServerError};
pub use lifecycle::Shutdown;
