//! Application state management
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::jwt::JwtConfig;
use crate::auth::password::PasswordConfig;
use crate::auth::service::AuthService;
use dex_core::{AppConfig, UserRepository};

/// Application state shared across handlers and middleware
///
/// Immutable after startup; shared as `Arc<AppState>`.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Authentication service (store, token config, hasher)
    pub auth: AuthService,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state with production hashing parameters
    pub fn new(config: AppConfig, users: Arc<dyn UserRepository>) -> Self {
        Self::with_password_config(config, users, PasswordConfig::default())
    }

    pub fn with_password_config(
        config: AppConfig,
        users: Arc<dyn UserRepository>,
        password: PasswordConfig,
    ) -> Self {
        let auth = AuthService::new(
            users,
            JwtConfig::from_app_config(&config),
            password,
            Duration::from_secs(config.server.ctx_timeout_secs),
        );

        Self {
            config,
            auth,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn csrf_enabled(&self) -> bool {
        self.config.server.csrf
    }
}
