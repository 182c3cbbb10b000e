//! Request-scoped context.
//!
//! # Responsibilities
//! - Assign every request an ID (UUID v4) unless the client sent one
//! - Carry request-scoped values in an immutable `RequestContext`
//! - Echo the ID back in the `x-request-id` response header
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The context lives in request extensions with a typed extractor, never
//!   as loose string keys

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::http::response::ApiError;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

/// Identifier attached to one request and every log line it produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a client-supplied ID if it is printable and reasonably short.
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        let value = value.to_str().ok()?.trim();
        if value.is_empty() || value.len() > MAX_REQUEST_ID_LEN {
            return None;
        }
        Some(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Values scoped to a single request. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
}

impl RequestContext {
    pub fn new(request_id: RequestId) -> Self {
        Self { request_id }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Look up the context of a request that passed through [`request_id`].
    pub fn from_request<B>(request: &Request<B>) -> Option<&Self> {
        request.extensions().get::<Self>()
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiError::internal("request context missing; request_id middleware not installed"))
    }
}

/// Middleware: attach a `RequestContext` and echo its ID on the response.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response {
    let id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(RequestId::from_header)
        .unwrap_or_default();

    request
        .extensions_mut()
        .insert(RequestContext::new(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    response
}

/// Extension trait for reading the request ID off any request.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        RequestContext::from_request(self).map(RequestContext::request_id)
    }
}
