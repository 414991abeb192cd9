//! Credential store
//!
//! [`UserRepository`] is the seam between the authentication pipeline and
//! whatever document store holds principals. Two adapters ship with the
//! crate: [`MemoryUserStore`] here and [`crate::postgres::PgUserStore`].
//!
//! Adapters own their own synchronization and retries. Username uniqueness
//! is enforced by the adapter at insert time and reported as
//! [`RepositoryError::AlreadyExists`].

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::user::{Pagination, User, UserUpdate};

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Username already exists")]
    AlreadyExists,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::AlreadyExists,
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

/// Trait for principal persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Get a principal by id
    async fn find_by_id(&self, id: Uuid) -> Result<User, RepositoryError>;

    /// Get a principal by its unique username
    async fn find_by_username(&self, username: &str) -> Result<User, RepositoryError>;

    /// Insert a principal; duplicate usernames fail with `AlreadyExists`
    async fn create(&self, user: User) -> Result<User, RepositoryError>;

    /// Apply a partial update and return the stored result
    async fn update_fields(&self, id: Uuid, update: UserUpdate) -> Result<User, RepositoryError>;

    /// Remove a principal
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// One page of principals ordered by creation time, plus the total count
    async fn list(&self, page: Pagination) -> Result<(Vec<User>, i64), RepositoryError>;
}

/// In-process credential store
///
/// Used when no database is configured and throughout the test suites.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserRepository for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<User, RepositoryError> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_username(&self, username: &str) -> Result<User, RepositoryError> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;

        // Checked under the write lock, so this is the authoritative guard
        if users.values().any(|u| u.username == user.username) {
            return Err(RepositoryError::AlreadyExists);
        }
        if users.contains_key(&user.id) {
            return Err(RepositoryError::AlreadyExists);
        }

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_fields(&self, id: Uuid, update: UserUpdate) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;

        if let Some(username) = &update.username {
            if users
                .values()
                .any(|u| u.id != id && &u.username == username)
            {
                return Err(RepositoryError::AlreadyExists);
            }
        }

        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(username) = update.username {
            user.username = username;
        }
        if let Some(role) = update.role {
            user.role = Some(role);
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn list(&self, page: Pagination) -> Result<(Vec<User>, i64), RepositoryError> {
        let users = self.users.read().await;

        let mut all: Vec<&User> = users.values().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let total = all.len() as i64;
        let items = all
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();

        Ok((items, total))
    }
}
