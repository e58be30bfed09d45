use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use futures::{StreamExt, TryStreamExt};

use common::hub::StoreRequest;
use common::prelude::Principal;

use crate::http::error::ApiError;
use crate::AppState;

#[axum::debug_handler]
pub async fn handler(
    State(state): State<AppState>,
    Path((principal, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let principal = Principal::parse(&principal)?;

    let stream = body
        .into_data_stream()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
        .boxed();

    let outcome = state
        .hub
        .handle_store(
            &principal,
            &path,
            StoreRequest {
                authorization: header_string(&headers, header::AUTHORIZATION),
                content_type: header_string(&headers, header::CONTENT_TYPE),
                content_length: headers
                    .get(header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok()),
                stream,
            },
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

pub(crate) fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
