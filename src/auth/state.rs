//! Auth configuration and the per-process state handed to handlers.
//!
//! Everything is constructed once in the server wiring and injected; no
//! component reaches for process-global connections or session state.

use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;

use super::credentials::CredentialStore;
use super::oauth::{OAuthClient, OAuthCredentials};
use super::resolver::IdentityResolver;
use super::session::SessionManager;
use super::strategy::{Provider, Strategies};
use crate::store::{SecretStore, SessionStore, UserStore};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    callback_base_url: String,
    session_secret: SecretString,
    session_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(callback_base_url: String, session_secret: SecretString) -> Self {
        Self {
            callback_base_url,
            session_secret,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn callback_base_url(&self) -> &str {
        &self.callback_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    /// Only mark cookies secure when the app is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.callback_base_url.starts_with("https://")
    }

    pub(crate) fn session_secret(&self) -> &SecretString {
        &self.session_secret
    }
}

pub struct AuthState {
    config: AuthConfig,
    strategies: Strategies,
    credentials: CredentialStore,
    resolver: IdentityResolver,
    sessions: SessionManager,
    secrets: Arc<dyn SecretStore>,
}

impl AuthState {
    /// Wire the auth components over injected stores. A provider without
    /// client credentials is simply not mounted as a strategy.
    ///
    /// # Errors
    /// Returns an error if an OAuth client cannot be constructed.
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        secrets: Arc<dyn SecretStore>,
        google: Option<OAuthCredentials>,
        facebook: Option<OAuthCredentials>,
    ) -> Result<Self> {
        let credentials = CredentialStore::new(users.clone());
        let resolver = IdentityResolver::new(users.clone());
        let session_manager = SessionManager::new(
            sessions,
            users,
            config.session_secret().clone(),
            config.session_ttl_seconds(),
        );

        let google = google
            .map(|creds| OAuthClient::new(Provider::Google, creds, config.callback_base_url()))
            .transpose()?;
        let facebook = facebook
            .map(|creds| OAuthClient::new(Provider::Facebook, creds, config.callback_base_url()))
            .transpose()?;

        let strategies = Strategies::new(credentials.clone(), google, facebook);

        Ok(Self {
            config,
            strategies,
            credentials,
            resolver,
            sessions: session_manager,
            secrets,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn strategies(&self) -> &Strategies {
        &self.strategies
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    #[must_use]
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn secrets(&self) -> &dyn SecretStore {
        self.secrets.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_overrides() {
        let config = AuthConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("secret".to_string()),
        );
        assert_eq!(config.callback_base_url(), "http://localhost:3000");
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert!(!config.session_cookie_secure());

        let config = config.with_session_ttl_seconds(60);
        assert_eq!(config.session_ttl_seconds(), 60);
    }

    #[test]
    fn https_base_url_marks_cookies_secure() {
        let config = AuthConfig::new(
            "https://hush.dev".to_string(),
            SecretString::from("secret".to_string()),
        );
        assert!(config.session_cookie_secure());
    }
}
