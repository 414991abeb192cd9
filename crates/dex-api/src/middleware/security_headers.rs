//! Security headers middleware
//!
//! Headers configured on every response:
//! - X-Content-Type-Options: nosniff
//! - X-Frame-Options: DENY
//! - Referrer-Policy: strict-origin-when-cross-origin
//! - Cache-Control: no-store (responses carry tokens and principal data)
//! - Strict-Transport-Security, only when cookies are marked Secure, i.e.
//!   the server sits behind TLS
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

pub async fn security_headers_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store"));

    if state.config.cookie.secure {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PasswordConfig;
    use axum::{
        http::{Request, StatusCode},
        middleware,
        response::IntoResponse,
        routing::get,
        Router,
    };
    use dex_core::{AppConfig, MemoryUserStore};
    use tower::ServiceExt;

    async fn test_handler() -> impl IntoResponse {
        (StatusCode::OK, "test response")
    }

    fn app(secure: bool) -> Router {
        let mut config = AppConfig::default();
        config.cookie.secure = secure;
        let state = Arc::new(AppState::with_password_config(
            config,
            Arc::new(MemoryUserStore::new()),
            PasswordConfig::fast(),
        ));

        Router::new()
            .route("/test", get(test_handler))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                security_headers_middleware,
            ))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_security_headers_added() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(false).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
        assert!(headers.get(header::STRICT_TRANSPORT_SECURITY).is_none());
    }

    #[tokio::test]
    async fn test_hsts_when_secure() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(true).oneshot(request).await.unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::STRICT_TRANSPORT_SECURITY)
                .unwrap(),
            "max-age=31536000; includeSubDomains"
        );
    }
}
