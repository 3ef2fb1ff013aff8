//! Identity strategies: one pluggable verifier per authentication method.
//!
//! Each provider is a variant of [`IdentityStrategy`] sharing the
//! `{initiate, complete}` surface. Route dispatch picks the variant through
//! [`Strategies::select`], the single lookup point keyed by provider name.

use serde_json::Value;

use super::credentials::CredentialStore;
use super::error::AuthError;
use super::oauth::OAuthClient;
use crate::store::User;

/// External OAuth providers. Local login is not a provider; it has no
/// externally-assigned id space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "google" => Some(Self::Google),
            "facebook" => Some(Self::Facebook),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
        }
    }
}

/// What an OAuth provider asserts about the visitor: the provider-scoped id
/// plus the raw profile document it returned.
#[derive(Clone, Debug)]
pub struct ExternalIdentity {
    pub provider: Provider,
    pub external_id: String,
    pub raw_profile: Value,
}

/// Inbound material a strategy verifies.
#[derive(Clone, Copy, Debug)]
pub enum AuthAttempt<'a> {
    /// Posted form credentials for the local path.
    Credentials { username: &'a str, password: &'a str },
    /// The authorization code carried by a provider callback.
    Callback { code: &'a str },
}

/// Result of a completed strategy. Local verification already names a user;
/// external identities still need find-or-create reconciliation.
#[derive(Debug)]
pub enum StrategyOutcome {
    Local(User),
    External(ExternalIdentity),
}

pub enum IdentityStrategy {
    Local(CredentialStore),
    OAuth(OAuthClient),
}

impl IdentityStrategy {
    /// Consent URL to redirect the user agent to. Local login has no
    /// redirect step; the form posts straight to `complete`.
    #[must_use]
    pub fn initiate(&self) -> Option<String> {
        match self {
            Self::Local(_) => None,
            Self::OAuth(client) => Some(client.authorize_url()),
        }
    }

    pub async fn complete(&self, attempt: AuthAttempt<'_>) -> Result<StrategyOutcome, AuthError> {
        match (self, attempt) {
            (Self::Local(credentials), AuthAttempt::Credentials { username, password }) => {
                let user = credentials.verify(username, password).await?;
                Ok(StrategyOutcome::Local(user))
            }
            (Self::OAuth(client), AuthAttempt::Callback { code }) => {
                let identity = client.exchange(code).await?;
                Ok(StrategyOutcome::External(identity))
            }
            // A form post to an OAuth variant (or a callback to the local
            // one) carries nothing the strategy can verify.
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}

/// The configured strategy set. OAuth entries are absent when the provider's
/// client credentials were not supplied.
pub struct Strategies {
    local: IdentityStrategy,
    google: Option<IdentityStrategy>,
    facebook: Option<IdentityStrategy>,
}

impl Strategies {
    #[must_use]
    pub fn new(
        local: CredentialStore,
        google: Option<OAuthClient>,
        facebook: Option<OAuthClient>,
    ) -> Self {
        Self {
            local: IdentityStrategy::Local(local),
            google: google.map(IdentityStrategy::OAuth),
            facebook: facebook.map(IdentityStrategy::OAuth),
        }
    }

    #[must_use]
    pub fn local(&self) -> &IdentityStrategy {
        &self.local
    }

    /// Single lookup point for provider dispatch; `None` for unknown names
    /// and for providers that were not configured.
    #[must_use]
    pub fn select(&self, name: &str) -> Option<&IdentityStrategy> {
        match Provider::from_name(name)? {
            Provider::Google => self.google.as_ref(),
            Provider::Facebook => self.facebook.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::error::AuthError;
    use crate::store::MemoryUserStore;
    use std::sync::Arc;

    #[test]
    fn provider_names_round_trip() {
        assert_eq!(Provider::from_name("google"), Some(Provider::Google));
        assert_eq!(Provider::from_name("facebook"), Some(Provider::Facebook));
        assert_eq!(Provider::from_name("twitter"), None);
        assert_eq!(Provider::from_name("Google"), None);

        assert_eq!(Provider::Google.as_str(), "google");
        assert_eq!(Provider::Facebook.as_str(), "facebook");
    }

    fn strategies() -> Strategies {
        Strategies::new(
            CredentialStore::new(Arc::new(MemoryUserStore::new())),
            None,
            None,
        )
    }

    #[test]
    fn unconfigured_providers_are_not_selectable() {
        let strategies = strategies();
        assert!(strategies.select("google").is_none());
        assert!(strategies.select("facebook").is_none());
        assert!(strategies.select("twitter").is_none());
    }

    #[tokio::test]
    async fn local_strategy_verifies_registered_credentials() {
        let users = Arc::new(MemoryUserStore::new());
        let credentials = CredentialStore::new(users);
        credentials
            .register("alice@example.com", "correct horse battery")
            .await
            .expect("register succeeds");

        let strategy = IdentityStrategy::Local(credentials);
        assert!(strategy.initiate().is_none());

        let outcome = strategy
            .complete(AuthAttempt::Credentials {
                username: "alice@example.com",
                password: "correct horse battery",
            })
            .await
            .expect("complete succeeds");
        match outcome {
            StrategyOutcome::Local(user) => {
                assert_eq!(user.username.as_deref(), Some("alice@example.com"));
            }
            StrategyOutcome::External(_) => panic!("local strategy produced an external identity"),
        }
    }

    #[tokio::test]
    async fn mismatched_attempt_shapes_are_rejected() {
        let strategy = IdentityStrategy::Local(CredentialStore::new(Arc::new(
            MemoryUserStore::new(),
        )));
        let result = strategy.complete(AuthAttempt::Callback { code: "abc" }).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }
}
