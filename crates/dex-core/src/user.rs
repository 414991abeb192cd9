//! Principal records
//!
//! A [`User`] is the identity the authentication pipeline resolves on every
//! request. It is owned by the credential store and only changes through
//! [`UserUpdate`]. The password hash never leaves the server: everything that
//! is sent to a client goes through [`UserPublic`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Role given to principals that register without one.
pub const DEFAULT_ROLE: &str = "user";

/// Role that passes every authorization guard.
pub const ADMIN_ROLE: &str = "admin";

/// Stored principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Store identifier
    pub id: Uuid,

    /// Unique login name
    pub username: String,

    /// Argon2id PHC string. Never serialized in responses.
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Normalized role (trimmed, lowercase)
    pub role: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a new, not yet persisted principal
    ///
    /// `role` is normalized here so that every stored role is already in the
    /// form the authorization guards compare against.
    pub fn new(username: impl Into<String>, password_hash: String, role: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash,
            role: Some(
                role.and_then(normalize_role)
                    .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            ),
            created_at: now,
            updated_at: now,
        }
    }

    /// Identifier in the hex form carried by access tokens
    pub fn hex_id(&self) -> String {
        hex_id(self.id)
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }

    /// Drop the password hash and produce the outward representation
    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            username: self.username.clone(),
            role: self.role.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Principal as exposed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserPublic {
    pub id: Uuid,
    pub username: String,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserPublic {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// Partial update applied by [`crate::UserRepository::update_fields`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub role: Option<String>,
}

impl UserUpdate {
    /// Trim the username and normalize the role; blank values are dropped
    pub fn normalized(self) -> Self {
        Self {
            username: self
                .username
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            role: self.role.as_deref().and_then(normalize_role),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.role.is_none()
    }
}

/// Trim and lowercase a role; blank roles become `None`
pub fn normalize_role(raw: &str) -> Option<String> {
    let role = raw.trim().to_lowercase();
    if role.is_empty() {
        None
    } else {
        Some(role)
    }
}

/// Hex form of a principal id (32 lowercase hex digits)
pub fn hex_id(id: Uuid) -> String {
    id.simple().to_string()
}

/// Parse a principal id in either hex or hyphenated form
pub fn parse_user_id(raw: &str) -> Option<Uuid> {
    Uuid::try_parse(raw.trim()).ok()
}

/// One page of principals
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserList {
    pub total_count: i64,
    pub total_pages: i64,
    pub page: i64,
    pub size: i64,
    pub has_more: bool,
    pub users: Vec<UserPublic>,
}

/// Page/size request for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub size: i64,
}

impl Pagination {
    pub const DEFAULT_SIZE: i64 = 10;
    pub const MAX_SIZE: i64 = 100;
    /// Highest page whose offset still fits in an `i64` at any size
    pub const MAX_PAGE: i64 = i64::MAX / Self::MAX_SIZE;

    /// Clamp raw query values into a usable page (pages start at 1)
    pub fn new(page: Option<i64>, size: Option<i64>) -> Self {
        let size = match size {
            Some(s) if s > 0 => s.min(Self::MAX_SIZE),
            _ => Self::DEFAULT_SIZE,
        };
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1).min(Self::MAX_PAGE),
            size,
        }
    }

    pub fn limit(&self) -> i64 {
        self.size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.size)
    }

    pub fn total_pages(&self, total_count: i64) -> i64 {
        total_count.saturating_add(self.size - 1) / self.size
    }

    pub fn has_more(&self, total_count: i64) -> bool {
        self.page < self.total_pages(total_count)
    }

    /// Assemble a [`UserList`] for this page
    pub fn page_of(&self, total_count: i64, users: Vec<UserPublic>) -> UserList {
        UserList {
            total_count,
            total_pages: self.total_pages(total_count),
            page: self.page,
            size: self.size,
            has_more: self.has_more(total_count),
            users,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}
