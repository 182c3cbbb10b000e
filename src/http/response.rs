//! JSON error responses.
//!
//! Every error leaves the server as `{"error": "<message>"}` with the
//! matching status code. Internal errors are logged in full and hidden from
//! the client behind a generic message.

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub const INTERNAL_MESSAGE: &str =
    "The server encountered a problem and could not process your request";
pub const NOT_FOUND_MESSAGE: &str = "The requested resource could not be found";
pub const AUTHENTICATION_REQUIRED_MESSAGE: &str =
    "You must be authenticated to access this resource";

/// Wire format of an error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Errors a handler can return to the client.
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    MethodNotAllowed(Method),
    BadRequest(String),
    AuthenticationRequired,
    InvalidAuthenticationToken,
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Internal(err.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationRequired | Self::InvalidAuthenticationToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the client.
    pub fn client_message(&self) -> String {
        match self {
            Self::NotFound => NOT_FOUND_MESSAGE.to_string(),
            Self::MethodNotAllowed(method) => {
                format!("The {method} method is not supported for this resource")
            }
            Self::BadRequest(message) => message.clone(),
            Self::AuthenticationRequired => AUTHENTICATION_REQUIRED_MESSAGE.to_string(),
            Self::InvalidAuthenticationToken => "Invalid authentication token".to_string(),
            Self::Internal(_) => INTERNAL_MESSAGE.to_string(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal(err) => write!(f, "internal error: {err}"),
            other => f.write_str(&other.client_message()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref err) = self {
            tracing::error!(error = %err, "Request failed");
        }

        let mut response = error_response(self.status(), self.client_message());
        if let Self::InvalidAuthenticationToken = self {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Build a JSON error response.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Fallback for unmatched paths.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Fallback for matched paths with an unsupported method.
pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn method_not_allowed_names_method() {
        let response = method_not_allowed(Method::DELETE).await.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            body_json(response).await["error"],
            "The DELETE method is not supported for this resource"
        );
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::internal("db exploded").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], INTERNAL_MESSAGE);
    }

    #[test]
    fn invalid_token_sets_challenge_header() {
        let response = ApiError::InvalidAuthenticationToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn bad_request_echoes_message() {
        let response = ApiError::BadRequest("missing field `name`".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "missing field `name`");
    }
}
