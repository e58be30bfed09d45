use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::GatewayState;

pub fn router() -> Router<GatewayState> {
    Router::new().route("/healthz", get(healthz))
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
