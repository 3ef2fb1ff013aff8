//! Route handlers and shared helpers: input validation, the session cookie,
//! and the auth gate.

pub mod health;
pub mod login;
pub mod logout;
pub mod oauth;
pub mod register;
pub mod root;
pub mod secrets;


use axum::http::{
    header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue, StatusCode,
};
use regex::Regex;
use tracing::error;

use crate::auth::{AuthConfig, AuthState};
use crate::store::User;

const SESSION_COOKIE_NAME: &str = "hush_session";

/// Usernames are email-shaped, matching what the registration form collects.
pub fn valid_username(username: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(username))
}

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

/// Auth gate: resolve the session cookie to a user, if any. Missing or stale
/// cookies are `Ok(None)`; only storage faults are errors.
pub(crate) async fn current_user(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<Option<User>, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    state.sessions().deserialize(&token).await.map_err(|err| {
        error!("failed to resolve session: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Store a session for the user and return the `Set-Cookie` headers for the
/// response.
pub(crate) async fn establish_session(
    state: &AuthState,
    user: &User,
) -> Result<HeaderMap, StatusCode> {
    let token = state.sessions().serialize(user).await.map_err(|err| {
        error!("failed to store session: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut headers = HeaderMap::new();
    let cookie = session_cookie(state.config(), &token).map_err(|err| {
        error!("failed to build session cookie: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    headers.insert(SET_COOKIE, cookie);
    Ok(headers)
}

/// Build the `HttpOnly` cookie holding the raw session token.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(
    config: &AuthConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod helper_tests {
    use super::*;
    use secrecy::SecretString;

    fn config(base: &str) -> AuthConfig {
        AuthConfig::new(base.to_string(), SecretString::from("secret".to_string()))
            .with_session_ttl_seconds(3600)
    }

    #[test]
    fn valid_username_accepts_email_shapes() {
        assert!(valid_username("a@example.com"));
        assert!(valid_username("name.surname@example.co"));
        assert!(!valid_username("not-an-email"));
        assert!(!valid_username("missing-domain@"));
    }

    #[test]
    fn valid_password_requires_minimum_length() {
        assert!(valid_password("12345678"));
        assert!(!valid_password("1234567"));
    }

    #[test]
    fn session_cookie_is_http_only_and_lax() {
        let cookie = session_cookie(&config("http://localhost:3000"), "tok").unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("hush_session=tok;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=3600"));
        assert!(!value.contains("Secure"));
    }

    #[test]
    fn session_cookie_is_secure_over_https() {
        let cookie = session_cookie(&config("https://hush.dev"), "tok").unwrap();
        assert!(cookie.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(&config("http://localhost:3000")).unwrap();
        assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn extract_session_token_scans_cookie_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; hush_session=tok; last=2"),
        );
        assert_eq!(extract_session_token(&headers), Some("tok".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("other=1"));
        assert_eq!(extract_session_token(&headers), None);

        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }
}
