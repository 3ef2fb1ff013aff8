//! The provider redirect dance: initiate sends the user agent to the
//! provider consent page; the callback completes the strategy, reconciles
//! the identity, and establishes a session.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, warn};

use super::establish_session;
use crate::auth::{AuthAttempt, AuthError, AuthState, StrategyOutcome};

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/{provider}",
    params(
        ("provider" = String, Path, description = "OAuth provider name: google or facebook")
    ),
    responses(
        (status = 303, description = "Redirect to the provider consent endpoint"),
        (status = 404, description = "Unknown or unconfigured provider")
    ),
    tag = "auth"
)]
pub async fn authenticate(
    Path(provider): Path<String>,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let Some(strategy) = state.strategies().select(&provider) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match strategy.initiate() {
        Some(consent_url) => Redirect::to(&consent_url).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/auth/{provider}/secrets",
    params(
        ("provider" = String, Path, description = "OAuth provider name: google or facebook"),
        ("code" = Option<String>, Query, description = "Authorization code from the provider"),
        ("error" = Option<String>, Query, description = "Provider-reported denial")
    ),
    responses(
        (status = 303, description = "Signed in; redirected to /secrets. \
            Denied or failed exchanges redirect to /login."),
        (status = 404, description = "Unknown or unconfigured provider")
    ),
    tag = "auth"
)]
pub async fn callback(
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let Some(strategy) = state.strategies().select(&provider) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let Some(denial) = query.error {
        warn!(provider = %provider, error = %denial, "provider reported access denial");
        return Redirect::to("/login").into_response();
    }
    let Some(code) = query.code else {
        warn!(provider = %provider, "callback carried neither a code nor an error");
        return Redirect::to("/login").into_response();
    };

    let identity = match strategy.complete(AuthAttempt::Callback { code: &code }).await {
        Ok(StrategyOutcome::External(identity)) => identity,
        Ok(StrategyOutcome::Local(_)) => {
            warn!(provider = %provider, "local outcome on a provider callback");
            return Redirect::to("/login").into_response();
        }
        Err(AuthError::StorageUnavailable(err)) => {
            error!("callback failed on storage: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        // Denials and unreachable providers land the user back on the login
        // page rather than surfacing an error.
        Err(err) => {
            warn!(provider = %provider, "provider exchange failed: {err}");
            return Redirect::to("/login").into_response();
        }
    };

    let user = match state.resolver().resolve(&identity).await {
        Ok(user) => user,
        Err(err) => {
            error!("identity resolution failed: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match establish_session(&state, &user).await {
        Ok(headers) => (headers, Redirect::to("/secrets")).into_response(),
        Err(status) => status.into_response(),
    }
}
