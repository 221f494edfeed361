use axum::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Argon2 hash; empty for accounts created via federated login.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expiry: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl User {
    /// A reset token counts only while its expiry lies in the future.
    pub fn reset_token_valid(&self, now: OffsetDateTime) -> bool {
        matches!(self.reset_token_expiry, Some(expiry) if expiry > now)
    }
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_email_verified: bool,
}

/// Partial update of mutable profile fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub is_email_verified: Option<bool>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.password_hash.is_none()
            && self.is_email_verified.is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    Duplicate,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Capability interface over user persistence. Handlers only see this trait,
/// so the Postgres backend can be swapped for the in-memory one in tests.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Exact-match lookup; expiry is checked by the caller so expired tokens
    /// can be cleared on use.
    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<User, StoreError>;

    /// Sets both reset fields in one statement, replacing any prior token.
    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expiry: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Clears both reset fields without touching the password.
    async fn clear_reset_token(&self, id: Uuid) -> Result<(), StoreError>;

    /// Stores the new password hash and clears both reset fields in a single
    /// update, so a consumed token can never be replayed.
    async fn reset_password(&self, id: Uuid, password_hash: &str) -> Result<User, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    async fn health(&self) -> Result<(), StoreError>;
}
