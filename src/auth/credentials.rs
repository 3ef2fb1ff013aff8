//! Local credential store: Argon2id registration and verification.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::error;

use super::error::AuthError;
use crate::store::{StoreError, User, UserStore};

/// Verified against when the username does not exist, so the miss costs the
/// same as a mismatch.
static DUMMY_HASH: Lazy<String> = Lazy::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"placeholder-password", &salt)
        .map(|hash| hash.to_string())
        .unwrap_or_default()
});

#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Register a local account. The salt is unique per user and lives inside
    /// the PHC hash string; the plaintext is dropped on return.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| {
                error!("failed to hash password: {err}");
                AuthError::StorageUnavailable(anyhow::anyhow!("password hashing failed"))
            })?
            .to_string();

        match self.users.insert_local(username, &password_hash).await {
            Ok(user) => Ok(user),
            // The unique index decides the loser of a concurrent registration.
            Err(StoreError::Conflict) => Err(AuthError::DuplicateUsername),
            Err(err) => Err(AuthError::storage(err)),
        }
    }

    /// Verify a local credential. Unknown usernames and wrong passwords are
    /// indistinguishable to the caller.
    pub async fn verify(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let credential = self
            .users
            .find_local(username)
            .await
            .map_err(AuthError::storage)?;

        let Some(credential) = credential else {
            burn_verification(password);
            return Err(AuthError::InvalidCredentials);
        };

        let parsed = PasswordHash::new(&credential.password_hash).map_err(|err| {
            error!("stored password hash is unparsable: {err}");
            AuthError::InvalidCredentials
        })?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
        {
            Ok(credential.user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

fn burn_verification(password: &str) {
    if let Ok(parsed) = PasswordHash::new(&DUMMY_HASH) {
        let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryUserStore;

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryUserStore::new()))
    }

    #[tokio::test]
    async fn register_then_verify_returns_the_same_user() {
        let credentials = store();
        let registered = credentials
            .register("alice@example.com", "correct horse battery")
            .await
            .expect("register succeeds");
        let verified = credentials
            .verify("alice@example.com", "correct horse battery")
            .await
            .expect("verify succeeds");
        assert_eq!(registered.id, verified.id);
        assert_eq!(verified.username.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let credentials = store();
        credentials
            .register("alice@example.com", "correct horse battery")
            .await
            .expect("register succeeds");
        let result = credentials
            .verify("alice@example.com", "incorrect horse battery")
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn unknown_username_is_invalid_credentials() {
        let credentials = store();
        let result = credentials.verify("nobody@example.com", "whatever!").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let credentials = store();
        credentials
            .register("alice@example.com", "correct horse battery")
            .await
            .expect("first registration succeeds");
        let second = credentials
            .register("alice@example.com", "another password")
            .await;
        assert!(matches!(second, Err(AuthError::DuplicateUsername)));
    }

    #[tokio::test]
    async fn stored_hash_is_salted_argon2id() {
        let users = Arc::new(MemoryUserStore::new());
        let credentials = CredentialStore::new(users.clone());
        credentials
            .register("alice@example.com", "correct horse battery")
            .await
            .expect("register succeeds");

        let stored = users
            .find_local("alice@example.com")
            .await
            .expect("lookup succeeds")
            .expect("credential exists");
        assert!(stored.password_hash.starts_with("$argon2id$"));
        assert!(!stored.password_hash.contains("correct horse battery"));
    }
}
