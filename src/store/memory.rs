//! In-memory stores for tests and credential-free local runs.
//!
//! Each write takes the store's single lock for the whole check-then-insert,
//! which gives the same effective atomicity the unique indexes provide in
//! PostgreSQL.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{LocalCredential, Secret, SecretStore, SessionStore, StoreError, User, UserStore};
use crate::auth::strategy::Provider;

#[derive(Clone, Debug)]
struct UserRecord {
    user: User,
    password_hash: Option<String>,
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users, for cardinality assertions in tests.
    pub async fn count(&self) -> usize {
        self.users.lock().await.len()
    }
}

fn external_id_of(user: &User, provider: Provider) -> Option<&str> {
    match provider {
        Provider::Google => user.google_id.as_deref(),
        Provider::Facebook => user.facebook_id.as_deref(),
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert_local(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        if users
            .values()
            .any(|record| record.user.username.as_deref() == Some(username))
        {
            return Err(StoreError::Conflict);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: Some(username.to_string()),
            google_id: None,
            facebook_id: None,
        };
        users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash: Some(password_hash.to_string()),
            },
        );
        Ok(user)
    }

    async fn find_local(&self, username: &str) -> Result<Option<LocalCredential>, StoreError> {
        let users = self.users.lock().await;
        Ok(users.values().find_map(|record| {
            match (&record.user.username, &record.password_hash) {
                (Some(name), Some(hash)) if name == username => Some(LocalCredential {
                    user: record.user.clone(),
                    password_hash: hash.clone(),
                }),
                _ => None,
            }
        }))
    }

    async fn insert_external(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        if users
            .values()
            .any(|record| external_id_of(&record.user, provider) == Some(external_id))
        {
            return Err(StoreError::Conflict);
        }
        let mut user = User {
            id: Uuid::new_v4(),
            username: None,
            google_id: None,
            facebook_id: None,
        };
        match provider {
            Provider::Google => user.google_id = Some(external_id.to_string()),
            Provider::Facebook => user.facebook_id = Some(external_id.to_string()),
        }
        users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash: None,
            },
        );
        Ok(user)
    }

    async fn find_external(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|record| external_id_of(&record.user, provider) == Some(external_id))
            .map(|record| record.user.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users.get(&id).map(|record| record.user.clone()))
    }
}

struct SessionRecord {
    user_id: Uuid,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Vec<u8>, SessionRecord>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(
        &self,
        token_hash: &[u8],
        user_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<(), StoreError> {
        let ttl = Duration::from_secs(ttl_seconds.max(0).unsigned_abs());
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(token_hash) {
            return Err(StoreError::Conflict);
        }
        sessions.insert(
            token_hash.to_vec(),
            SessionRecord {
                user_id,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Uuid>, StoreError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(token_hash)
            .filter(|record| record.expires_at > Instant::now())
            .map(|record| record.user_id))
    }

    async fn delete(&self, token_hash: &[u8]) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(token_hash);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<Vec<Secret>>,
}

impl MemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn insert(&self, user_id: Uuid, body: &str) -> Result<(), StoreError> {
        let mut secrets = self.secrets.lock().await;
        secrets.push(Secret {
            user_id,
            body: body.to_string(),
        });
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Secret>, StoreError> {
        let secrets = self.secrets.lock().await;
        Ok(secrets.clone())
    }
}
