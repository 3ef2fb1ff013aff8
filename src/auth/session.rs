//! Session serialization: an authenticated identity becomes an opaque
//! client-held token; each later request reverses the mapping.
//!
//! The session row stores only the user id, keyed by a secret-keyed digest
//! of the token. Raw tokens exist in the cookie and nowhere else.

use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

use super::error::AuthError;
use crate::store::{SessionStore, StoreError, User, UserStore};

#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    secret: SecretString,
    ttl_seconds: i64,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        secret: SecretString,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            sessions,
            users,
            secret,
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Store a reference to the user and return the raw token for the
    /// cookie. Only the user's id enters the session, never credential
    /// material.
    pub async fn serialize(&self, user: &User) -> Result<String, AuthError> {
        // Token-digest collisions are practically impossible, but the store
        // enforces uniqueness, so regenerate rather than fail on one.
        for _ in 0..3 {
            let token = generate_token().map_err(AuthError::StorageUnavailable)?;
            let token_hash = self.hash_token(&token);
            match self
                .sessions
                .insert(&token_hash, user.id, self.ttl_seconds)
                .await
            {
                Ok(()) => return Ok(token),
                Err(StoreError::Conflict) => {}
                Err(err) => return Err(AuthError::storage(err)),
            }
        }
        Err(AuthError::StorageUnavailable(anyhow::anyhow!(
            "failed to generate a unique session token"
        )))
    }

    /// Reverse the mapping. A stale token or a user id that no longer
    /// resolves yields `None`: unauthenticated, not an error.
    pub async fn deserialize(&self, token: &str) -> Result<Option<User>, AuthError> {
        let token_hash = self.hash_token(token);
        let Some(user_id) = self
            .sessions
            .lookup(&token_hash)
            .await
            .map_err(AuthError::storage)?
        else {
            return Ok(None);
        };

        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(AuthError::storage)?;
        if user.is_none() {
            warn!(%user_id, "session references a user that no longer exists");
        }
        Ok(user)
    }

    /// Destroy the session. Idempotent; unknown tokens are a no-op.
    pub async fn destroy(&self, token: &str) -> Result<(), AuthError> {
        let token_hash = self.hash_token(token);
        self.sessions
            .delete(&token_hash)
            .await
            .map_err(AuthError::storage)
    }

    /// The auth-gate predicate: true iff the token deserializes to a user.
    pub async fn is_authenticated(&self, token: &str) -> bool {
        matches!(self.deserialize(token).await, Ok(Some(_)))
    }

    fn hash_token(&self, token: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.expose_secret().as_bytes());
        hasher.update(token.as_bytes());
        hasher.finalize().to_vec()
    }
}

/// 32 random bytes, URL-safe encoded; the raw value is only ever sent to the
/// client.
fn generate_token() -> Result<String, anyhow::Error> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| anyhow::anyhow!("failed to generate session token: {err}"))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
