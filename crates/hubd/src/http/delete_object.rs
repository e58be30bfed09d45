use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;

use common::prelude::Principal;

use crate::http::error::ApiError;
use crate::http::store::header_string;
use crate::AppState;

#[axum::debug_handler]
pub async fn handler(
    State(state): State<AppState>,
    Path((principal, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let principal = Principal::parse(&principal)?;
    let authorization = header_string(&headers, header::AUTHORIZATION);

    state
        .hub
        .handle_delete(&principal, &path, authorization.as_deref())
        .await?;

    Ok(StatusCode::ACCEPTED)
}
