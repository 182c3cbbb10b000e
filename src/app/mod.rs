//! Application routes.
//!
//! # Responsibilities
//! - Build the router served by `http::Server`
//! - Install the request middleware stack in order
//! - Hold handler state (database handle)

pub mod handlers;

use axum::{middleware, routing::get, Router};

use crate::db::Database;
use crate::http::{middleware as mw, request, response};

/// State shared by all handlers.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub db: Option<Database>,
}

pub struct App {
    state: AppState,
}

impl App {
    pub fn new(db: Option<Database>) -> Self {
        Self {
            state: AppState { db },
        }
    }

    /// The full handler graph, middleware included.
    pub fn routes(&self) -> Router {
        Router::new()
            .route("/status", get(handlers::get_status))
            .fallback(response::not_found)
            .method_not_allowed_fallback(response::method_not_allowed)
            .with_state(self.state.clone())
            .layer(middleware::from_fn(mw::trace_request))
            .layer(middleware::from_fn(request::request_id))
            .layer(mw::recovery::layer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn status_reports_version_without_db() {
        let response = App::new(None)
            .routes()
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = json(response).await;
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["dbConnection"].is_null());
    }

    #[tokio::test]
    async fn status_reports_pool_stats() {
        let db = Database::connect_lazy(&crate::config::DatabaseConfig::default());
        let response = App::new(Some(db))
            .routes()
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = json(response).await;
        assert_eq!(body["dbConnection"]["maxOpenConnections"], 25);
        assert_eq!(body["dbConnection"]["openConnections"], 0);
    }

    #[tokio::test]
    async fn unknown_path_is_json_404() {
        let response = App::new(None)
            .routes()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json(response).await["error"], response::NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn wrong_method_is_json_405() {
        let response = App::new(None)
            .routes()
            .oneshot(Request::post("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            json(response).await["error"],
            "The POST method is not supported for this resource"
        );
    }
}
