//! The shared secrets board and the auth-gated submit routes.

use axum::{
    extract::{Extension, Form},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::current_user;
use crate::auth::AuthState;

const MAX_SECRET_LENGTH: usize = 500;

#[derive(Serialize, ToSchema)]
pub struct SecretEntry {
    user_id: String,
    secret: String,
}

#[derive(Serialize, ToSchema)]
pub struct SecretsResponse {
    secrets: Vec<SecretEntry>,
}

/// The board is rendered in aggregate for every visitor, authenticated or
/// not; entries are not scoped per viewer.
#[utoipa::path(
    get,
    path = "/secrets",
    responses(
        (status = 200, description = "All stored secrets", body = SecretsResponse)
    ),
    tag = "secrets"
)]
pub async fn secrets(state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    match state.secrets().list().await {
        Ok(entries) => {
            let secrets = entries
                .into_iter()
                .map(|entry| SecretEntry {
                    user_id: entry.user_id.to_string(),
                    secret: entry.body,
                })
                .collect();
            Json(SecretsResponse { secrets }).into_response()
        }
        Err(err) => {
            error!("failed to list secrets: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Readiness probe for the submit page: the frontend renders it only when
/// the session is authenticated.
#[utoipa::path(
    get,
    path = "/submit",
    responses(
        (status = 204, description = "Session is authenticated; the submit page may render"),
        (status = 303, description = "Unauthenticated; redirected to /login")
    ),
    tag = "secrets"
)]
pub async fn submit_page(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    match current_user(&headers, &state).await {
        Ok(Some(_)) => StatusCode::NO_CONTENT.into_response(),
        Ok(None) => Redirect::to("/login").into_response(),
        Err(status) => status.into_response(),
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitForm {
    secret: String,
}

#[utoipa::path(
    post,
    path = "/submit",
    request_body(content = SubmitForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Secret stored; redirected to /secrets. \
            Unauthenticated requests redirect to /login.")
    ),
    tag = "secrets"
)]
pub async fn submit(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Form<SubmitForm>>,
) -> impl IntoResponse {
    let user = match current_user(&headers, &state).await {
        Ok(Some(user)) => user,
        Ok(None) => return Redirect::to("/login").into_response(),
        Err(status) => return status.into_response(),
    };

    let Some(Form(form)) = payload else {
        return Redirect::to("/submit").into_response();
    };
    let body = form.secret.trim();
    if body.is_empty() || body.chars().count() > MAX_SECRET_LENGTH {
        return Redirect::to("/submit").into_response();
    }

    match state.secrets().insert(user.id, body).await {
        Ok(()) => Redirect::to("/secrets").into_response(),
        Err(err) => {
            error!("failed to store secret: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
