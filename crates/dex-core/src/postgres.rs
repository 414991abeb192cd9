//! PostgreSQL credential store
//!
//! Stores principals in a `users` table using SQLx. The unique index on
//! `username` is what actually prevents duplicate registrations; a violation
//! surfaces as [`RepositoryError::AlreadyExists`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::repository::{RepositoryError, UserRepository};
use crate::user::{Pagination, User, UserUpdate};

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at, updated_at";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    username TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT users_username_key UNIQUE (username)
)
"#;

/// PostgreSQL-backed [`UserRepository`]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new store connection
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::Database(format!("PostgreSQL connection failed: {e}")))?;

        tracing::info!(max_connections, "Connected to PostgreSQL credential store");
        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `users` table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        tracing::debug!("users table ready");
        Ok(())
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    role: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl UserRepository for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::from).ok_or(RepositoryError::NotFound)
    }

    async fn find_by_username(&self, username: &str) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::from).ok_or(RepositoryError::NotFound)
    }

    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, username, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update_fields(&self, id: Uuid, update: UserUpdate) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                role = COALESCE($3, role),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.username)
        .bind(update.role)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::from).ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, page: Pagination) -> Result<(Vec<User>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        if total == 0 {
            return Ok((Vec::new(), 0));
        }

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(User::from).collect(), total))
    }
}
