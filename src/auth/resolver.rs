//! Find-or-create reconciliation of external identities onto user records.

use std::sync::Arc;
use tracing::info;

use super::error::AuthError;
use super::strategy::ExternalIdentity;
use crate::store::{StoreError, User, UserStore};

#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserStore>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Resolve an external identity to exactly one user record, creating one
    /// on first sight. Existing records are returned unchanged; there is no
    /// profile-refresh merge.
    pub async fn resolve(&self, identity: &ExternalIdentity) -> Result<User, AuthError> {
        if let Some(user) = self
            .users
            .find_external(identity.provider, &identity.external_id)
            .await
            .map_err(AuthError::storage)?
        {
            return Ok(user);
        }

        match self
            .users
            .insert_external(identity.provider, &identity.external_id)
            .await
        {
            Ok(user) => {
                info!(
                    provider = identity.provider.as_str(),
                    user_id = %user.id,
                    "created user for first-seen external identity"
                );
                Ok(user)
            }
            // Lost the insert race to a concurrent callback; the winner's row
            // is the one to use, so retry the lookup once.
            Err(StoreError::Conflict) => self
                .users
                .find_external(identity.provider, &identity.external_id)
                .await
                .map_err(AuthError::storage)?
                .ok_or_else(|| {
                    AuthError::StorageUnavailable(anyhow::anyhow!(
                        "external identity vanished after conflicting insert"
                    ))
                }),
            Err(err) => Err(AuthError::storage(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::strategy::Provider;
    use crate::store::MemoryUserStore;
    use serde_json::json;

    fn identity(external_id: &str) -> ExternalIdentity {
        ExternalIdentity {
            provider: Provider::Google,
            external_id: external_id.to_string(),
            raw_profile: json!({ "sub": external_id }),
        }
    }

    #[tokio::test]
    async fn resolve_creates_on_first_sight() {
        let users = Arc::new(MemoryUserStore::new());
        let resolver = IdentityResolver::new(users.clone());

        let user = resolver.resolve(&identity("g123")).await.expect("resolves");
        assert_eq!(user.google_id.as_deref(), Some("g123"));
        assert_eq!(user.username, None);
        assert_eq!(users.count().await, 1);
    }

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let users = Arc::new(MemoryUserStore::new());
        let resolver = IdentityResolver::new(users.clone());

        let first = resolver.resolve(&identity("g123")).await.expect("resolves");
        let second = resolver.resolve(&identity("g123")).await.expect("resolves");
        assert_eq!(first.id, second.id);
        assert_eq!(users.count().await, 1);
    }

    #[tokio::test]
    async fn distinct_external_ids_get_distinct_users() {
        let users = Arc::new(MemoryUserStore::new());
        let resolver = IdentityResolver::new(users.clone());

        let first = resolver.resolve(&identity("g123")).await.expect("resolves");
        let second = resolver.resolve(&identity("g456")).await.expect("resolves");
        assert_ne!(first.id, second.id);
        assert_eq!(users.count().await, 2);
    }

    #[tokio::test]
    async fn concurrent_resolves_create_exactly_one_user() {
        let users = Arc::new(MemoryUserStore::new());
        let resolver = IdentityResolver::new(users.clone());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                resolver.resolve(&identity("g123")).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            let user = handle
                .await
                .expect("task completes")
                .expect("resolve succeeds");
            ids.push(user.id);
        }

        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(users.count().await, 1);
    }

    #[tokio::test]
    async fn conflict_on_insert_falls_back_to_the_winner() {
        let users = Arc::new(MemoryUserStore::new());
        let winner = users
            .insert_external(Provider::Google, "g123")
            .await
            .expect("insert succeeds");

        let resolver = IdentityResolver::new(users.clone());
        let resolved = resolver.resolve(&identity("g123")).await.expect("resolves");
        assert_eq!(resolved.id, winner.id);
        assert_eq!(users.count().await, 1);
    }
}
