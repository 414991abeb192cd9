//! dex API - REST server with JWT authentication
//!
//! Provides registration, login and user management endpoints under
//! `/api/v1`, protected by bearer/cookie tokens, role guards and an optional
//! CSRF double-submit check.
//!
//! Author: hephaex@gmail.com

pub mod api_docs;
pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use api_docs::ApiDoc;
use auth::csrf::CSRF_HEADER;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use error::AppError;
use state::AppState;
use std::any::Any;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .nest("/api/v1", routes::api_routes(state.clone()))
        .route("/api-docs/openapi.json", get(openapi_json));

    with_http_layers(routes, state)
}

/// Wrap routes in the shared HTTP stack, innermost first
fn with_http_layers(routes: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::security_headers_middleware,
        ))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// A panicking handler fails its own request with a 500 envelope
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic payload".to_string());

    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let csrf_header = HeaderName::from_static(CSRF_HEADER);
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            csrf_header.clone(),
        ])
        .expose_headers([csrf_header]);

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        layer.allow_origin(AnyOrigin)
    } else {
        layer.allow_origin(origins).allow_credentials(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PasswordConfig;
    use axum::{body::Body, http::Request, http::StatusCode};
    use dex_core::{AppConfig, MemoryUserStore};
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::with_password_config(
            AppConfig::default(),
            Arc::new(MemoryUserStore::new()),
            PasswordConfig::fast(),
        ))
    }

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_panicking_handler_returns_500() {
        let routes = Router::new()
            .route("/explode", get(explode))
            .route("/fine", get(|| async { "ok" }));
        let app = with_http_layers(routes, state());

        let response = app
            .clone()
            .oneshot(Request::get("/explode").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 500);
        assert_eq!(json["error"], "internal server error");
        assert!(!json.to_string().contains("exploded"));

        // The service keeps answering after a panic
        let response = app
            .oneshot(Request::get("/fine").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_responses_gzip_when_accepted() {
        let response = create_router(state())
            .oneshot(
                Request::get("/api-docs/openapi.json")
                    .header(header::ACCEPT_ENCODING, "gzip")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_ENCODING).unwrap(),
            "gzip"
        );
    }

    #[test]
    fn test_panic_payload_kinds() {
        let response = panic_response(Box::new("static str"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = panic_response(Box::new(42_u8));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
