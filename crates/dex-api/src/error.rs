//! API error handling
//!
//! Every failure that reaches a client goes through [`AppError`]. The
//! kind → status/message table lives in [`AppError::status`] and
//! [`AppError::message`] and nowhere else; component errors are converted
//! with `From` impls, never by inspecting error text.
//!
//! Author: hephaex@gmail.com

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::auth::jwt::JwtError;
use crate::auth::middleware::AuthError;
use crate::auth::password::PasswordError;
use dex_core::RepositoryError;

/// Error envelope returned to clients
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Short error description
    pub error: String,
    /// Request-specific details (validation failures only)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub causes: Option<serde_json::Value>,
}

/// Application error kinds
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("username already exists")]
    AlreadyExists,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::AlreadyExists => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "invalid credentials",
            AppError::AlreadyExists => "user with given username already exists",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::NotFound => "not found",
            AppError::BadRequest(_) | AppError::Validation(_) => "bad request",
            AppError::Internal(_) => "internal server error",
        }
    }

    fn causes(&self) -> Option<serde_json::Value> {
        match self {
            AppError::BadRequest(msg) => Some(serde_json::Value::String(msg.clone())),
            AppError::Validation(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        ApiError {
            status: self.status().as_u16(),
            error: self.message().to_string(),
            causes: self.causes(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(self.to_api_error())).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => AppError::NotFound,
            RepositoryError::AlreadyExists => AppError::AlreadyExists,
            RepositoryError::Database(msg) => AppError::Internal(msg),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooLong => AppError::BadRequest(err.to_string()),
            PasswordError::HashingFailed(_) => AppError::Internal(err.to_string()),
        }
    }
}

/// Only reachable from token minting; parse failures go through [`AuthError`]
impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        if err.status() == StatusCode::FORBIDDEN {
            AppError::Forbidden
        } else {
            AppError::Unauthorized
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Signup {
        #[validate(length(min = 6))]
        password: String,
    }

    #[test]
    fn test_status_table() {
        let cases = [
            (AppError::InvalidCredentials, 401, "invalid credentials"),
            (
                AppError::AlreadyExists,
                400,
                "user with given username already exists",
            ),
            (AppError::Unauthorized, 401, "unauthorized"),
            (AppError::Forbidden, 403, "forbidden"),
            (AppError::NotFound, 404, "not found"),
            (AppError::BadRequest("x".into()), 400, "bad request"),
            (AppError::Internal("db down".into()), 500, "internal server error"),
        ];

        for (err, status, message) in cases {
            assert_eq!(err.status().as_u16(), status, "{err:?}");
            assert_eq!(err.message(), message);
        }
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let body = AppError::Internal("connection refused to 10.0.0.5".into()).to_api_error();
        let json = serde_json::to_string(&body).unwrap();

        assert!(!json.contains("10.0.0.5"));
        assert!(!json.contains("causes"));
        assert_eq!(body.status, 500);
    }

    #[test]
    fn test_validation_causes() {
        let errors = Signup {
            password: "abc".to_string(),
        }
        .validate()
        .unwrap_err();

        let body = AppError::from(errors).to_api_error();
        assert_eq!(body.status, 400);
        assert!(body.causes.unwrap().to_string().contains("password"));
    }

    #[test]
    fn test_repository_error_mapping() {
        assert!(matches!(
            AppError::from(RepositoryError::NotFound),
            AppError::NotFound
        ));
        assert!(matches!(
            AppError::from(RepositoryError::AlreadyExists),
            AppError::AlreadyExists
        ));
        assert!(matches!(
            AppError::from(RepositoryError::Database("boom".into())),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_password_error_mapping() {
        let too_long = AppError::from(PasswordError::TooLong);
        assert_eq!(too_long.status(), StatusCode::BAD_REQUEST);

        let failed = AppError::from(PasswordError::HashingFailed("params".into()));
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_auth_error_collapses() {
        assert!(matches!(
            AppError::from(AuthError::InvalidToken(JwtError::Expired)),
            AppError::Unauthorized
        ));
        assert!(matches!(
            AppError::from(AuthError::InvalidToken(JwtError::InvalidSignature)),
            AppError::Unauthorized
        ));
        assert!(matches!(
            AppError::from(AuthError::InsufficientPermissions),
            AppError::Forbidden
        ));
        assert!(matches!(
            AppError::from(AuthError::CsrfMismatch),
            AppError::Forbidden
        ));
    }
}
