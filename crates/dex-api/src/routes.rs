//! API route definitions
//!
//! Each group of routes carries its own pipeline as `route_layer`s. The last
//! `route_layer` added runs first, so `auth_middleware` is always added last.
//!
//! Author: hephaex@gmail.com

use crate::auth::csrf::{csrf_middleware, session_middleware};
use crate::auth::guard::{require_any_role, require_self_or_admin};
use crate::auth::middleware::auth_middleware;
use crate::handlers::{auth, health};
use crate::state::AppState;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use dex_core::ADMIN_ROLE;
use std::sync::Arc;

const ADMIN_ONLY: &[&str] = &[ADMIN_ROLE];

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/auth/new", post(auth::register_handler))
        .route("/auth", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/csrf", get(auth::csrf_token_handler));

    // Any authenticated principal
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    // Authenticated, state-changing
    let csrf_routes = Router::new()
        .route("/auth", put(auth::update_user_handler))
        .route_layer(from_fn_with_state(state.clone(), csrf_middleware))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    // Owner or admin
    let owner_routes = Router::new()
        .route("/auth/:id", get(auth::get_user_handler))
        .route_layer(from_fn(require_self_or_admin))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    // Admin only
    let admin_routes = Router::new()
        .route("/auth/users", get(auth::list_users_handler))
        .route_layer(from_fn(require_any_role(ADMIN_ONLY)))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let admin_csrf_routes = Router::new()
        .route("/auth/:id", delete(auth::delete_user_handler))
        .route_layer(from_fn_with_state(state.clone(), csrf_middleware))
        .route_layer(from_fn(require_any_role(ADMIN_ONLY)))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(csrf_routes)
        .merge(owner_routes)
        .merge(admin_routes)
        .merge(admin_csrf_routes)
        .layer(from_fn_with_state(state, session_middleware))
}
