//! Authentication API handlers
//!
//! Provides HTTP endpoints for registration, login, the current principal
//! and user management. Login and registration also set the access token as
//! an HttpOnly cookie so browser clients can authenticate without a header.
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::csrf::{derive_token, SessionId, CSRF_HEADER};
use crate::auth::{
    AuthenticatedUser, CsrfTokenResponse, ListUsersQuery, LoginRequest, RegisterRequest,
    UpdateUserRequest, UserWithToken,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use dex_core::{parse_user_id, UserList, UserPublic, DEFAULT_ROLE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Logout response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    pub message: String,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

fn cookie_header(value: String) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&value)
        .map_err(|e| AppError::Internal(format!("invalid Set-Cookie value: {e}")))
}

/// `Set-Cookie` value carrying the access token
fn token_cookie(state: &AppState, token: &str) -> String {
    let cookie = &state.config.cookie;
    let mut value = format!(
        "{}={}; Path=/; Max-Age={}",
        cookie.name,
        token,
        state.auth.jwt_config().ttl_secs
    );
    if cookie.http_only {
        value.push_str("; HttpOnly");
    }
    value.push_str("; SameSite=Lax");
    if cookie.secure {
        value.push_str("; Secure");
    }
    value
}

fn expired_token_cookie(state: &AppState) -> String {
    let mut value = format!(
        "{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax",
        state.config.cookie.name
    );
    if state.config.cookie.secure {
        value.push_str("; Secure");
    }
    value
}

fn session_cookie(state: &AppState, sid: &str) -> String {
    let mut value = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        state.config.session.name, sid, state.config.session.expire_secs
    );
    if state.config.cookie.secure {
        value.push_str("; Secure");
    }
    value
}

fn with_token_cookie(state: &AppState, token: &str) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie_header(token_cookie(state, token))?);
    Ok(headers)
}

/// Register a new user
///
/// New users get the role from the request, or "user" when none is given.
#[utoipa::path(
    post,
    path = "/api/v1/auth/new",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserWithToken),
        (status = 400, description = "Invalid input or username taken", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    request_headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let username = request.username.clone();
    let ip_address = extract_ip_address(&request_headers);
    let user_agent = extract_user_agent(&request_headers);

    let result = match state.auth.register(request).await {
        Ok(result) => result,
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                username,
                reason: e.to_string(),
                ip_address,
                user_agent,
            });
            return Err(e);
        }
    };

    audit_log(&AuditEvent::RegistrationSuccess {
        user_id: result.user.id,
        username: result.user.username.clone(),
        role: result
            .user
            .role
            .clone()
            .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        ip_address,
        user_agent,
    });

    let headers = with_token_cookie(&state, &result.token)?;
    Ok((StatusCode::CREATED, headers, Json(result)))
}

/// Login with username and password
///
/// Unknown usernames and wrong passwords get the same response.
#[utoipa::path(
    post,
    path = "/api/v1/auth",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = UserWithToken),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    request_headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let username = request.username.clone();
    let ip_address = extract_ip_address(&request_headers);
    let user_agent = extract_user_agent(&request_headers);

    let result = match state.auth.login(request).await {
        Ok(result) => result,
        Err(e) => {
            audit_log(&AuditEvent::LoginFailure {
                username,
                reason: e.to_string(),
                ip_address,
                user_agent,
            });
            return Err(e);
        }
    };

    audit_log(&AuditEvent::LoginSuccess {
        user_id: result.user.id,
        username: result.user.username.clone(),
        ip_address,
        user_agent,
    });

    let headers = with_token_cookie(&state, &result.token)?;
    Ok((StatusCode::OK, headers, Json(result)))
}

/// Clear the access token cookie
///
/// Tokens are not revoked; a copied token stays valid until it expires.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Cookie cleared", body = LogoutResponse),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    request_headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    audit_log(&AuditEvent::Logout {
        ip_address: extract_ip_address(&request_headers),
    });

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie_header(expired_token_cookie(&state))?);

    Ok((
        headers,
        Json(LogoutResponse {
            message: "Logged out".to_string(),
        }),
    ))
}

/// Get current authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current principal", body = UserPublic),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<UserPublic> {
    Json(user.user)
}

/// Update the caller's username or role
///
/// Only administrators may change a role.
#[utoipa::path(
    put,
    path = "/api/v1/auth",
    tag = "auth",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated principal", body = UserPublic),
        (status = 400, description = "Invalid input or username taken", body = crate::error::ApiError),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Role change by non-admin or CSRF failure", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserPublic>, AppError> {
    let request = json_body(payload)?;
    let updated = state.auth.update_user(&user.user, request).await?;
    Ok(Json(updated))
}

/// List users (admin only)
#[utoipa::path(
    get,
    path = "/api/v1/auth/users",
    tag = "auth",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "One page of users", body = UserList),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Not an administrator", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<Json<UserList>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let users = state.auth.list_users(query).await?;
    Ok(Json(users))
}

/// Get a user by id (self or admin)
#[utoipa::path(
    get,
    path = "/api/v1/auth/{id}",
    tag = "auth",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserPublic),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Not the owner or an administrator", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserPublic>, AppError> {
    let id = parse_user_id(&id).ok_or(AppError::NotFound)?;
    let user = state.auth.get_user(id).await?;
    Ok(Json(user))
}

/// Delete a user (admin only)
#[utoipa::path(
    delete,
    path = "/api/v1/auth/{id}",
    tag = "auth",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Not an administrator or CSRF failure", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedUser>,
    request_headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let target: Uuid = parse_user_id(&id).ok_or(AppError::NotFound)?;
    state.auth.delete_user(target).await?;

    audit_log(&AuditEvent::UserDeleted {
        actor_id: actor.id(),
        target_id: target,
        ip_address: extract_ip_address(&request_headers),
    });

    Ok(StatusCode::NO_CONTENT)
}

/// Issue the CSRF token for the caller's session
///
/// Starts a new session (and sets its cookie) when the request has none.
#[utoipa::path(
    get,
    path = "/api/v1/auth/csrf",
    tag = "auth",
    responses(
        (status = 200, description = "CSRF token, also sent in the X-CSRF-Token header", body = CsrfTokenResponse),
    )
)]
pub async fn csrf_token_handler(
    State(state): State<Arc<AppState>>,
    session: Option<Extension<SessionId>>,
) -> Result<impl IntoResponse, AppError> {
    let mut headers = HeaderMap::new();

    let sid = match session {
        Some(Extension(SessionId(sid))) => sid,
        None => {
            let sid = Uuid::new_v4().simple().to_string();
            headers.insert(header::SET_COOKIE, cookie_header(session_cookie(&state, &sid))?);
            sid
        }
    };

    let token = derive_token(&sid);
    headers.insert(
        CSRF_HEADER,
        HeaderValue::from_str(&token)
            .map_err(|e| AppError::Internal(format!("invalid CSRF header value: {e}")))?,
    );

    Ok((headers, Json(CsrfTokenResponse { csrf_token: token })))
}
