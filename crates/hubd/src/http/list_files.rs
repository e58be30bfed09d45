use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use common::hub::ListRequest;
use common::prelude::Principal;

use crate::http::error::ApiError;
use crate::http::store::header_string;
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListFilesRequest {
    /// Opaque cursor from a previous page.
    pub page: Option<String>,
    /// Return per-entry metadata instead of bare names.
    pub stat: Option<bool>,
}

#[axum::debug_handler]
pub async fn handler(
    State(state): State<AppState>,
    Path(principal): Path<String>,
    headers: HeaderMap,
    body: Option<Json<ListFilesRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = Principal::parse(&principal)?;
    let Json(req) = body.unwrap_or_default();

    let outcome = state
        .hub
        .handle_list(
            &principal,
            ListRequest {
                authorization: header_string(&headers, header::AUTHORIZATION),
                page: req.page,
                stat: req.stat.unwrap_or(false),
            },
        )
        .await?;

    Ok(Json(outcome))
}
