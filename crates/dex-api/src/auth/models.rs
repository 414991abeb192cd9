//! Request and response bodies for the authentication endpoints
//!
//! Request bodies are validated with `validator` before any store access;
//! a failure becomes a 400 carrying the per-field causes.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::auth::password::MAX_PASSWORD_BYTES;
use dex_core::UserPublic;

/// The hasher caps input by bytes, `length` counts characters
fn password_fits_hasher(password: &str) -> Result<(), ValidationError> {
    if password.len() > MAX_PASSWORD_BYTES {
        let mut error = ValidationError::new("password_bytes");
        error.message = Some(format!("password must be at most {MAX_PASSWORD_BYTES} bytes").into());
        return Err(error);
    }
    Ok(())
}

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// Unique login name
    #[validate(length(min = 1, max = 64, message = "username must be 1-64 characters"))]
    #[schema(example = "alice")]
    pub username: String,

    /// Plaintext password (6-72 bytes)
    #[validate(length(
        min = 6,
        max = 72,
        message = "password must be 6-72 characters"
    ))]
    #[validate(custom(function = "password_fits_hasher"))]
    #[schema(example = "secret1")]
    pub password: String,

    /// Optional role; defaults to "user"
    #[validate(length(max = 32))]
    pub role: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "alice")]
    pub username: String,

    #[validate(length(min = 1, max = 72))]
    #[schema(example = "secret1")]
    pub password: String,
}

/// Partial update of the caller's own record
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: Option<String>,

    /// Only administrators may change roles
    #[validate(length(max = 32))]
    pub role: Option<String>,
}

/// Principal together with a freshly issued access token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserWithToken {
    pub user: UserPublic,
    pub token: String,
}

/// CSRF token bound to the caller's session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CsrfTokenResponse {
    /// Send back in the `X-CSRF-Token` header on state-changing requests
    pub csrf_token: String,
}

/// Paging parameters for the user listing
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// 1-based page number
    pub page: Option<i64>,
    /// Page size (max 100)
    pub size: Option<i64>,
}
