//! Outbound OAuth2 client: consent-URL construction, code-for-token
//! exchange, and profile retrieval.
//!
//! No orchestration state survives between the initiate and callback
//! requests; the authorization code carried by the callback is the only
//! context the exchange needs.

use anyhow::{Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, warn};
use url::Url;

use super::error::AuthError;
use super::strategy::{ExternalIdentity, Provider};
use crate::hush::APP_USER_AGENT;

/// Outbound calls that exceed this window count as provider-unreachable.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

struct Endpoints {
    authorize: &'static str,
    token: &'static str,
    profile: &'static str,
    scope: &'static str,
    /// Field of the profile document holding the provider-scoped id.
    id_field: &'static str,
}

const fn endpoints(provider: Provider) -> Endpoints {
    match provider {
        Provider::Google => Endpoints {
            authorize: "https://accounts.google.com/o/oauth2/v2/auth",
            token: "https://oauth2.googleapis.com/token",
            profile: "https://www.googleapis.com/oauth2/v3/userinfo",
            scope: "profile",
            id_field: "sub",
        },
        Provider::Facebook => Endpoints {
            authorize: "https://www.facebook.com/v19.0/dialog/oauth",
            token: "https://graph.facebook.com/v19.0/oauth/access_token",
            profile: "https://graph.facebook.com/me",
            scope: "public_profile",
            id_field: "id",
        },
    }
}

/// Client id/secret pair issued by a provider.
#[derive(Clone, Debug)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct OAuthClient {
    provider: Provider,
    credentials: OAuthCredentials,
    authorize_url: Url,
    callback_url: String,
    http: Client,
}

impl OAuthClient {
    /// Build a client for one provider. The callback URL is fixed at
    /// construction: `<base>/auth/<provider>/secrets`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        provider: Provider,
        credentials: OAuthCredentials,
        callback_base_url: &str,
    ) -> Result<Self> {
        let authorize_url = Url::parse(endpoints(provider).authorize)
            .context("failed to parse provider authorize endpoint")?;

        let callback_url = format!(
            "{}/auth/{}/secrets",
            callback_base_url.trim_end_matches('/'),
            provider.as_str()
        );

        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .context("failed to build OAuth HTTP client")?;

        Ok(Self {
            provider,
            credentials,
            authorize_url,
            callback_url,
            http,
        })
    }

    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// The provider consent URL the user agent is redirected to.
    #[must_use]
    pub fn authorize_url(&self) -> String {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("redirect_uri", &self.callback_url)
            .append_pair("response_type", "code")
            .append_pair("scope", endpoints(self.provider).scope);
        url.into()
    }

    /// Exchange an authorization code for the provider's profile and extract
    /// the provider-scoped external id.
    pub async fn exchange(&self, code: &str) -> Result<ExternalIdentity, AuthError> {
        let token = self.fetch_access_token(code).await?;
        let profile = self.fetch_profile(&token).await?;

        let Some(external_id) = profile
            .get(endpoints(self.provider).id_field)
            .and_then(Value::as_str)
        else {
            error!(
                provider = self.provider.as_str(),
                "profile response is missing the external id"
            );
            return Err(AuthError::ProviderDenied);
        };

        Ok(ExternalIdentity {
            provider: self.provider,
            external_id: external_id.to_string(),
            raw_profile: profile,
        })
    }

    async fn fetch_access_token(&self, code: &str) -> Result<String, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose_secret()),
            ("redirect_uri", self.callback_url.as_str()),
        ];

        let response = self
            .http
            .post(endpoints(self.provider).token)
            .form(&params)
            .send()
            .await
            .map_err(|err| self.transport_error("token exchange", &err))?;

        if !response.status().is_success() {
            warn!(
                provider = self.provider.as_str(),
                status = %response.status(),
                "provider rejected the authorization code"
            );
            return Err(AuthError::ProviderDenied);
        }

        let token: TokenResponse = response.json().await.map_err(|err| {
            warn!(
                provider = self.provider.as_str(),
                "malformed token response: {err}"
            );
            AuthError::ProviderDenied
        })?;

        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<Value, AuthError> {
        let response = self
            .http
            .get(endpoints(self.provider).profile)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| self.transport_error("profile fetch", &err))?;

        if !response.status().is_success() {
            warn!(
                provider = self.provider.as_str(),
                status = %response.status(),
                "provider rejected the profile request"
            );
            return Err(AuthError::ProviderDenied);
        }

        response.json().await.map_err(|err| {
            warn!(
                provider = self.provider.as_str(),
                "malformed profile response: {err}"
            );
            AuthError::ProviderDenied
        })
    }

    fn transport_error(&self, stage: &str, err: &reqwest::Error) -> AuthError {
        error!(
            provider = self.provider.as_str(),
            "{stage} failed to reach the provider: {err}"
        );
        AuthError::ProviderUnreachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(provider: Provider) -> OAuthClient {
        OAuthClient::new(
            provider,
            OAuthCredentials {
                client_id: "client-123".to_string(),
                client_secret: SecretString::from("shh".to_string()),
            },
            "http://localhost:3000/",
        )
        .expect("client builds")
    }

    #[test]
    fn authorize_url_carries_the_redirect_dance_parameters() {
        let url = client(Provider::Google).authorize_url();
        let parsed = Url::parse(&url).expect("authorize url parses");

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("client_id".into(), "client-123".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://localhost:3000/auth/google/secrets".into()
        )));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("scope".into(), "profile".into())));
    }

    #[test]
    fn callback_url_trims_trailing_slash() {
        let url = client(Provider::Facebook).authorize_url();
        assert!(url.contains("facebook%2Fsecrets") || url.contains("facebook/secrets"));
        assert!(!url.contains("localhost%3A3000//"));
    }

    #[test]
    fn provider_id_fields_match_profile_documents() {
        assert_eq!(endpoints(Provider::Google).id_field, "sub");
        assert_eq!(endpoints(Provider::Facebook).id_field, "id");
    }
}
