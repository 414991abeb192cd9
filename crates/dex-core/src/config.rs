//! Dex Configuration Management
//!
//! Handles configuration from environment variables and TOML files with
//! sensible defaults for development. The configuration is built once at
//! startup and handed to the server state; nothing reads it ambiently.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Signing secret used when none is configured. Only suitable for development.
pub const DEVELOPMENT_JWT_SECRET: &str = "development-secret-key-change-in-production";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Authentication cookie settings
    pub cookie: CookieConfig,

    /// Session cookie settings (CSRF scheme input)
    pub session: SessionConfig,

    /// Credential store connection
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    ///
    /// Every variable that is set wins over the file, including values equal
    /// to the built-in default.
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())?;
        self.validate()?;
        Ok(self)
    }

    /// Overwrite each field whose variable `lookup` returns
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", &port)?;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.server.jwt_secret = secret;
        }
        if let Some(csrf) = lookup("CSRF_ENABLED") {
            self.server.csrf = parse_bool("CSRF_ENABLED", &csrf)?;
        }
        if let Some(timeout) = lookup("CTX_TIMEOUT_SECS") {
            self.server.ctx_timeout_secs = parse_value("CTX_TIMEOUT_SECS", &timeout)?;
        }

        // CORS origins, comma-separated
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Cookies
        if let Some(name) = lookup("COOKIE_NAME") {
            self.cookie.name = name;
        }
        if let Some(secure) = lookup("COOKIE_SECURE") {
            self.cookie.secure = parse_bool("COOKIE_SECURE", &secure)?;
        }
        if let Some(name) = lookup("SESSION_COOKIE_NAME") {
            self.session.name = name;
        }

        // PostgreSQL
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.postgres_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(size) = lookup("DATABASE_POOL_SIZE") {
            self.database.pool_size = parse_value("DATABASE_POOL_SIZE", &size)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format = parse_bool("LOG_JSON", &json)?;
        }

        Ok(())
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.cookie.name.is_empty() {
            return Err(ConfigError::MissingRequired("COOKIE_NAME".to_string()));
        }
        if self.session.name.is_empty() {
            return Err(ConfigError::MissingRequired("SESSION_COOKIE_NAME".to_string()));
        }
        Ok(())
    }

    /// True when the signing secret is still the development default
    pub fn uses_development_secret(&self) -> bool {
        self.server.jwt_secret == DEVELOPMENT_JWT_SECRET
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// HMAC secret for signing access tokens
    pub jwt_secret: String,

    /// Upper bound for a single credential store round-trip, in seconds
    pub ctx_timeout_secs: u64,

    /// Enable the CSRF double-submit check on cookie-authenticated requests
    pub csrf: bool,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
            ctx_timeout_secs: 5,
            csrf: false,
            // Empty by default for security - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// Authentication cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie carrying the access token
    pub name: String,

    /// Mark the cookie `Secure`
    pub secure: bool,

    /// Mark the cookie `HttpOnly`
    pub http_only: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "jwt-token".to_string(),
            secure: false,
            http_only: true,
        }
    }
}

/// Session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie carrying the session id
    pub name: String,

    /// Session cookie lifetime in seconds
    pub expire_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "session-id".to_string(),
            expire_secs: 86400,
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the in-memory store is used when unset
    pub postgres_url: Option<String>,

    /// PostgreSQL connection pool size
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: None,
            pool_size: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
