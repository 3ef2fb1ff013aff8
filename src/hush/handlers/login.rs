use axum::{
    extract::{Extension, Form},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::establish_session;
use crate::auth::{AuthAttempt, AuthError, AuthState, StrategyOutcome};

#[derive(Deserialize, ToSchema)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in; redirected to /secrets. \
            Invalid credentials redirect back to /login.")
    ),
    tag = "auth"
)]
pub async fn login(
    state: Extension<Arc<AuthState>>,
    payload: Option<Form<LoginForm>>,
) -> impl IntoResponse {
    let Some(Form(form)) = payload else {
        return Redirect::to("/login").into_response();
    };

    // The local strategy delegates to the credential store; a session only
    // exists after verification has succeeded.
    let outcome = state
        .strategies()
        .local()
        .complete(AuthAttempt::Credentials {
            username: &form.username,
            password: &form.password,
        })
        .await;

    match outcome {
        Ok(StrategyOutcome::Local(user)) => match establish_session(&state, &user).await {
            Ok(headers) => (headers, Redirect::to("/secrets")).into_response(),
            Err(status) => status.into_response(),
        },
        Ok(StrategyOutcome::External(_)) | Err(AuthError::InvalidCredentials) => {
            Redirect::to("/login").into_response()
        }
        Err(err) => {
            error!("login failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
