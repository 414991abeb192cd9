//! Role-based authorization guards
//!
//! Guards run after [`super::middleware::auth_middleware`] and read the
//! [`AuthenticatedUser`] it stored. The `"admin"` role passes every guard.
//! Role comparison is exact and case-sensitive; stored roles are already
//! normalized.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Path, Request},
    middleware::Next,
    response::Response,
};
use dex_core::{parse_user_id, ADMIN_ROLE};
use uuid::Uuid;

use super::middleware::{AuthError, AuthenticatedUser};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};

/// True when `role` is in `allowed` or is the admin role
pub fn check_any_role(role: Option<&str>, allowed: &[&str]) -> bool {
    match role {
        Some(ADMIN_ROLE) => true,
        Some(role) => allowed.contains(&role),
        None => false,
    }
}

/// True when the principal is an admin or owns `target`
///
/// A target that is not a valid principal id never matches.
pub fn check_self_or_admin(user: &AuthenticatedUser, target: &str) -> bool {
    if user.is_admin() {
        return true;
    }
    parse_user_id(target) == Some(user.id())
}

fn authenticated(request: &Request<Body>) -> Result<AuthenticatedUser, AuthError> {
    request
        .extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or(AuthError::MissingContext)
}

fn deny(
    request: &Request<Body>,
    user_id: Option<Uuid>,
    username: Option<String>,
    resource: String,
    required_role: Option<String>,
) {
    audit_log(&AuditEvent::AccessDenied {
        user_id,
        username,
        resource,
        required_role,
        ip_address: extract_ip_address(request.headers()),
        user_agent: extract_user_agent(request.headers()),
    });
}

/// Type alias for role middleware future
type RoleMiddlewareFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>>;

/// Middleware factory for role-based access control
///
/// # Example
///
/// ```ignore
/// use axum::{Router, routing::get, middleware};
/// use dex_api::auth::guard::require_any_role;
/// use dex_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/auth/users", get(list_users))
///     .route_layer(middleware::from_fn(require_any_role(&["admin"])))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub fn require_any_role(
    required_roles: &'static [&'static str],
) -> impl Fn(Request<Body>, Next) -> RoleMiddlewareFuture + Clone {
    move |request: Request<Body>, next: Next| {
        Box::pin(async move {
            let user = authenticated(&request)?;

            if !check_any_role(user.role(), required_roles) {
                deny(
                    &request,
                    Some(user.id()),
                    Some(user.user.username.clone()),
                    format!("roles:{}", required_roles.join(",")),
                    Some(required_roles.join(",")),
                );
                return Err(AuthError::InsufficientPermissions);
            }

            Ok(next.run(request).await)
        })
    }
}

/// Allow admins, or the principal named by the `:id` path parameter
pub async fn require_self_or_admin(
    Path(params): Path<HashMap<String, String>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let user = authenticated(&request)?;
    let target = params.get("id").map(String::as_str).unwrap_or_default();

    if !check_self_or_admin(&user, target) {
        deny(
            &request,
            Some(user.id()),
            Some(user.user.username.clone()),
            format!("user:{target}"),
            None,
        );
        return Err(AuthError::NotOwner);
    }

    Ok(next.run(request).await)
}
