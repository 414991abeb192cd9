//! JWT token generation and validation
//!
//! Implements stateless bearer tokens with HMAC-SHA256 signing.
//! Tokens carry the principal id and username and live for a fixed
//! [`TOKEN_TTL_SECS`]; they are never refreshed or extended.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use dex_core::{hex_id, AppConfig};

/// Access token lifetime: 60 minutes
pub const TOKEN_TTL_SECS: u64 = 60 * 60;

/// JWT Claims structure
///
/// `id`, `sub` and `iss` all hold the principal id in hex form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id (hex)
    pub id: String,
    /// Username at issuance time
    pub username: String,
    /// Subject - principal id
    pub sub: String,
    /// Issuer - principal id
    pub iss: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Malformed token")]
    Malformed,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// JWT Configuration
///
/// Built once at startup from [`AppConfig`] and shared read-only.
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    pub secret: String,
    /// Access token lifetime in seconds
    pub ttl_secs: u64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs: TOKEN_TTL_SECS,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.server.jwt_secret.clone())
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Generate a JWT access token for an authenticated principal
///
/// # Example
///
/// ```no_run
/// use dex_api::auth::jwt::{generate_access_token, JwtConfig};
/// use uuid::Uuid;
///
/// let config = JwtConfig::new("secret");
/// let token = generate_access_token(&config, Uuid::new_v4(), "alice")
///     .expect("Failed to generate token");
/// ```
pub fn generate_access_token(
    config: &JwtConfig,
    user_id: Uuid,
    username: &str,
) -> Result<String, JwtError> {
    generate_access_token_at(config, user_id, username, now_secs()?)
}

/// Generate a token as if issued at `issued_at` (Unix seconds)
pub(crate) fn generate_access_token_at(
    config: &JwtConfig,
    user_id: Uuid,
    username: &str,
    issued_at: u64,
) -> Result<String, JwtError> {
    let id = hex_id(user_id);
    let claims = Claims {
        id: id.clone(),
        username: username.to_string(),
        sub: id.clone(),
        iss: id,
        iat: issued_at,
        exp: issued_at + config.ttl_secs,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate a JWT access token and extract claims
///
/// Only HS256 is accepted; a token whose header names any other algorithm is
/// rejected as [`JwtError::Malformed`]. Expiry is checked with zero leeway.
pub fn validate_access_token(config: &JwtConfig, token: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub", "iss"]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        _ => JwtError::Malformed,
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn config(secret: &str) -> JwtConfig {
        JwtConfig::new(secret)
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = config("test-secret");
        let user_id = Uuid::new_v4();

        let token =
            generate_access_token(&config, user_id, "alice").expect("Failed to generate token");
        let claims = validate_access_token(&config, &token).expect("Failed to validate token");

        assert_eq!(claims.id, user_id.simple().to_string());
        assert_eq!(claims.sub, claims.id);
        assert_eq!(claims.iss, claims.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp, claims.iat + TOKEN_TTL_SECS);
    }

    #[test]
    fn test_wire_format() {
        let config = config("test-secret");
        let token = generate_access_token(&config, Uuid::new_v4(), "alice").unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");

        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        for key in ["id", "username", "iss", "exp"] {
            assert!(payload.get(key).is_some(), "missing claim {key}");
        }
    }

    #[test]
    fn test_malformed_token() {
        let config = config("test-secret");
        let result = validate_access_token(&config, "invalid.token.here");
        assert!(matches!(result, Err(JwtError::Malformed)));

        let result = validate_access_token(&config, "");
        assert!(matches!(result, Err(JwtError::Malformed)));
    }

    #[test]
    fn test_wrong_secret() {
        let token = generate_access_token(&config("secret1"), Uuid::new_v4(), "alice").unwrap();

        let result = validate_access_token(&config("secret2"), &token);
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_expired_token() {
        let config = config("test-secret");
        let now = now_secs().unwrap();

        // Issued two hours ago, expired one hour ago
        let token = generate_access_token_at(&config, Uuid::new_v4(), "alice", now - 7200).unwrap();

        let result = validate_access_token(&config, &token);
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_expires_just_after_ttl() {
        let config = config("test-secret");
        let now = now_secs().unwrap();

        let expired =
            generate_access_token_at(&config, Uuid::new_v4(), "alice", now - TOKEN_TTL_SECS - 2)
                .unwrap();
        assert!(matches!(
            validate_access_token(&config, &expired),
            Err(JwtError::Expired)
        ));

        let fresh = generate_access_token_at(&config, Uuid::new_v4(), "alice", now - 60).unwrap();
        assert!(validate_access_token(&config, &fresh).is_ok());
    }

    #[test]
    fn test_other_hmac_algorithm_rejected() {
        let config = config("test-secret");
        let now = now_secs().unwrap();
        let id = Uuid::new_v4().simple().to_string();
        let claims = Claims {
            id: id.clone(),
            username: "alice".to_string(),
            sub: id.clone(),
            iss: id,
            iat: now,
            exp: now + 600,
        };

        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        let result = validate_access_token(&config, &token);
        assert!(matches!(result, Err(JwtError::Malformed)));
    }

    #[test]
    fn test_unsigned_token_rejected() {
        let config = config("test-secret");
        let now = now_secs().unwrap();

        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"id":"x","username":"alice","sub":"x","iss":"x","iat":{now},"exp":{}}}"#,
            now + 600
        ));
        let token = format!("{header}.{payload}.");

        assert!(matches!(
            validate_access_token(&config, &token),
            Err(JwtError::Malformed)
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = config("super-secret-value");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("REDACTED"));
    }
}
