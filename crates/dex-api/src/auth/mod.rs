//! Authentication and authorization module
//!
//! This module provides JWT-based authentication with the following components:
//! - Password hashing with Argon2
//! - Token generation and validation
//! - Authentication service for registration, login and user management
//! - Middleware for request authentication
//! - Role and ownership guards
//! - CSRF double-submit protection for cookie-authenticated requests

pub mod csrf;
pub mod guard;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;

pub use csrf::{csrf_middleware, derive_token, session_middleware, validate_token, SessionId};
pub use guard::{check_any_role, check_self_or_admin, require_any_role, require_self_or_admin};
pub use jwt::{generate_access_token, validate_access_token, Claims, JwtConfig, JwtError};
pub use middleware::{auth_middleware, AuthError, AuthenticatedUser, TokenSource};
pub use models::{
    CsrfTokenResponse, ListUsersQuery, LoginRequest, RegisterRequest, UpdateUserRequest,
    UserWithToken,
};
pub use password::{hash_password, verify_password, PasswordConfig, PasswordError};
pub use service::AuthService;
