use axum::{
    extract::{Extension, Form},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::ToSchema;

use super::{establish_session, valid_password, valid_username};
use crate::auth::{AuthError, AuthState};

#[derive(Deserialize, ToSchema)]
pub struct RegisterForm {
    username: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/register",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Registered and signed in; redirected to /secrets. \
            Duplicate usernames and invalid input redirect back to /register.")
    ),
    tag = "auth"
)]
pub async fn register(
    state: Extension<Arc<AuthState>>,
    payload: Option<Form<RegisterForm>>,
) -> impl IntoResponse {
    let Some(Form(form)) = payload else {
        return Redirect::to("/register").into_response();
    };

    if !valid_username(&form.username) || !valid_password(&form.password) {
        return Redirect::to("/register").into_response();
    }

    match state.credentials().register(&form.username, &form.password).await {
        Ok(user) => match establish_session(&state, &user).await {
            Ok(headers) => (headers, Redirect::to("/secrets")).into_response(),
            Err(status) => status.into_response(),
        },
        Err(AuthError::DuplicateUsername) => {
            warn!("registration rejected: username already taken");
            Redirect::to("/register").into_response()
        }
        Err(err) => {
            error!("registration failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
