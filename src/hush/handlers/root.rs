use axum::response::{IntoResponse, Json};
use serde_json::json;

/// The home page itself is rendered by the frontend; the root route only
/// identifies the service.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service banner")
    ),
    tag = "hush"
)]
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
