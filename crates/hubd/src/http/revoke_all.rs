use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use common::prelude::Principal;

use crate::http::error::ApiError;
use crate::http::store::header_string;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct RevokeAllRequest {
    #[serde(rename = "oldestValidTimestamp")]
    pub oldest_valid_timestamp: u64,
}

#[axum::debug_handler]
pub async fn handler(
    State(state): State<AppState>,
    Path(principal): Path<String>,
    headers: HeaderMap,
    Json(req): Json<RevokeAllRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = Principal::parse(&principal)?;
    let authorization = header_string(&headers, header::AUTHORIZATION);

    state
        .hub
        .handle_revoke(
            &principal,
            authorization.as_deref(),
            req.oldest_valid_timestamp,
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "success" })),
    ))
}
