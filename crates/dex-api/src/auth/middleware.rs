//! Authentication middleware for protecting routes
//!
//! Extracts the access token from the Authorization header (or, when no
//! header is sent, from the login cookie), validates it and resolves the
//! principal it names. On success an [`AuthenticatedUser`] is added to the
//! request extensions.

use super::jwt::{validate_access_token, JwtError};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dex_core::{parse_user_id, UserPublic};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Where the access token of a request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// Login cookie
    Cookie,
}

/// Authenticated principal resolved from the access token
///
/// Extract in handlers with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: UserPublic,
    pub source: TokenSource,
}

impl AuthenticatedUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Option<&str> {
        self.user.role.as_deref()
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }
}

/// Authentication, authorization and CSRF rejections
///
/// Clients only ever see `unauthorized` or `forbidden`; the variant is kept
/// for the audit log.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing access token")]
    MissingToken,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),

    #[error("Token id claim is not a principal id")]
    InvalidClaims,

    #[error("Token principal does not exist")]
    UnknownPrincipal,

    #[error("Principal lookup failed: {0}")]
    StoreUnavailable(String),

    #[error("No authenticated principal on request")]
    MissingContext,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Principal does not own the resource")]
    NotOwner,

    #[error("Missing CSRF token header")]
    CsrfTokenMissing,

    #[error("Missing session for CSRF check")]
    CsrfSessionMissing,

    #[error("CSRF token mismatch")]
    CsrfMismatch,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InsufficientPermissions
            | AuthError::NotOwner
            | AuthError::CsrfTokenMissing
            | AuthError::CsrfSessionMissing
            | AuthError::CsrfMismatch => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Read a cookie value from the `Cookie` headers
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Locate the access token of a request
///
/// An `Authorization` header wins over the cookie; the two are never
/// combined. The header must hold exactly two whitespace-separated parts,
/// the second being the token. An empty header counts as absent.
pub fn extract_token(
    headers: &HeaderMap,
    cookie_name: &str,
) -> Result<(String, TokenSource), AuthError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .filter(|value| !value.is_empty());

    if let Some(value) = authorization {
        let value = value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
        let parts: Vec<&str> = value.split_whitespace().collect();
        if parts.len() != 2 {
            return Err(AuthError::InvalidAuthHeader);
        }
        return Ok((parts[1].to_string(), TokenSource::Bearer));
    }

    extract_cookie(headers, cookie_name)
        .map(|token| (token, TokenSource::Cookie))
        .ok_or(AuthError::MissingToken)
}

/// Authentication middleware that requires a valid access token
///
/// This middleware:
/// 1. Locates the token (header first, then cookie)
/// 2. Validates signature and expiry
/// 3. Resolves the principal named by the `id` claim
/// 4. Adds AuthenticatedUser to request extensions
///
/// # Usage
///
/// ```ignore
/// use axum::{Router, routing::get, middleware};
/// use dex_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/protected", get(protected_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
///     .with_state(state);
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    match authenticate(&state, request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                ip_address: extract_ip_address(request.headers()),
                user_agent: extract_user_agent(request.headers()),
                reason: e.to_string(),
            });
            Err(e)
        }
    }
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, AuthError> {
    let (token, source) = extract_token(headers, &state.config.cookie.name)?;

    let claims = validate_access_token(state.auth.jwt_config(), &token)?;
    let user_id = parse_user_id(&claims.id).ok_or(AuthError::InvalidClaims)?;

    let user = state
        .auth
        .resolve_principal(user_id)
        .await
        .map_err(|e| match e {
            dex_core::RepositoryError::NotFound => AuthError::UnknownPrincipal,
            other => AuthError::StoreUnavailable(other.to_string()),
        })?;

    Ok(AuthenticatedUser { user, source })
}
