//! Dex Core - Domain models, credential store and configuration
//!
//! This crate defines the pieces the API server builds on:
//! - Principal records and their public projection
//! - The credential store trait with in-memory and PostgreSQL adapters
//! - Configuration management

pub mod config;
pub mod postgres;
pub mod repository;
pub mod user;

pub use config::{
    AppConfig, ConfigError, CookieConfig, DatabaseConfig, LoggingConfig, ServerConfig,
    SessionConfig,
};
pub use postgres::PgUserStore;
pub use repository::{MemoryUserStore, RepositoryError, UserRepository};
pub use user::{
    hex_id, normalize_role, parse_user_id, Pagination, User, UserList, UserPublic, UserUpdate,
    ADMIN_ROLE, DEFAULT_ROLE,
};
