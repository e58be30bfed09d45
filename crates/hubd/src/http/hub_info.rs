use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::AppState;

#[axum::debug_handler]
pub async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.hub.info())
}
