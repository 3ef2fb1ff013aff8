//! Storage traits and record types.
//!
//! Components never hold a database pool directly; they receive trait objects
//! so production code can run against PostgreSQL while tests use the
//! in-memory stores.

pub mod memory;
pub mod postgres;

pub use memory::{MemorySecretStore, MemorySessionStore, MemoryUserStore};
pub use postgres::{PgSecretStore, PgSessionStore, PgUserStore};

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::strategy::Provider;

/// Identity record. At least one of the credential paths is populated; a
/// given (provider, external id) pair maps to at most one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: Option<String>,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
}

/// A local username plus the stored password hash, loaded for verification.
#[derive(Clone, Debug)]
pub struct LocalCredential {
    pub user: User,
    pub password_hash: String,
}

/// A user-submitted text entry. `user_id` is a lookup key, not ownership;
/// entries are listed in aggregate.
#[derive(Clone, Debug)]
pub struct Secret {
    pub user_id: Uuid,
    pub body: String,
}

#[derive(Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write. The storage layer, not an
    /// application-level existence check, decides the loser of a race.
    Conflict,
    Unavailable(anyhow::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict => write!(f, "uniqueness constraint violated"),
            Self::Unavailable(err) => write!(f, "storage unavailable: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Conflict => None,
            Self::Unavailable(err) => Some(err.as_ref()),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user with a local credential. `StoreError::Conflict` when the
    /// username is already taken.
    async fn insert_local(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, StoreError>;

    async fn find_local(&self, username: &str) -> Result<Option<LocalCredential>, StoreError>;

    /// Insert a user carrying only a provider id. `StoreError::Conflict` when
    /// another record already claimed that (provider, external id).
    async fn insert_external(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<User, StoreError>;

    async fn find_external(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a session under the token digest. Raw tokens never reach the
    /// store.
    async fn insert(
        &self,
        token_hash: &[u8],
        user_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<(), StoreError>;

    /// Resolve an unexpired session to its user id.
    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Uuid>, StoreError>;

    /// Idempotent; deleting a missing session is not an error.
    async fn delete(&self, token_hash: &[u8]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn insert(&self, user_id: Uuid, body: &str) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<Secret>, StoreError>;
}
