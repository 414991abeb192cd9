//! Password hashing and verification using Argon2id
//!
//! Parameters follow OWASP recommendations:
//! - Algorithm: Argon2id (memory-hard, resistant to GPU attacks)
//! - Memory: 64 MB
//! - Iterations: 3
//! - Parallelism: 4 threads
//! - Salt: 16 bytes random
//! - Output: 32 bytes hash
//!
//! Verification fails closed: callers only ever learn "match" or "no match".

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use thiserror::Error;

/// Longest password accepted for hashing, in bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Password exceeds {} bytes", MAX_PASSWORD_BYTES)]
    TooLong,
}

/// Password hashing configuration
///
/// Increasing memory or iterations improves security but slows down hashing.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (threads, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    /// Cheap parameters for test suites
    pub fn fast() -> Self {
        Self {
            memory_cost: 8192,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        }
    }

    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Hash a plaintext password using Argon2id with the default parameters
///
/// The returned PHC string embeds algorithm, parameters and salt, so it is
/// the only value that needs storing.
///
/// # Example
///
/// ```no_run
/// use dex_api::auth::password::hash_password;
///
/// let hash = hash_password("secret1").expect("Failed to hash password");
/// // $argon2id$v=19$m=65536,t=3,p=4$...
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_config(password, &PasswordConfig::default())
}

/// Hash a password with custom configuration
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordError::TooLong);
    }

    let salt = SaltString::generate(&mut OsRng);
    let params = config.to_params()?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored hash
///
/// Returns `false` for a wrong password and for every internal failure
/// (unparseable hash, unsupported parameters); the cause is only logged.
///
/// ```no_run
/// use dex_api::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("secret1").unwrap();
/// assert!(verify_password("secret1", &hash));
/// assert!(!verify_password("wrongpass", &hash));
/// ```
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(e) => {
            tracing::debug!(error = %e, "Stored password hash could not be parsed");
            return false;
        }
    };

    // Parameters are read from the PHC string
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => true,
        Err(argon2::password_hash::Error::Password) => false,
        Err(e) => {
            tracing::debug!(error = %e, "Password verification failed internally");
            false
        }
    }
}
