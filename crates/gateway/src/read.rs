//! Serving object bytes by `(bucket, key)`.
//!
//! No authentication: anything a driver will hand back under a bucket name is
//! public. Concurrent stat lookups for the same object are coalesced through
//! the keyed single-flight lock; a loser simply performs its own lookup.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};

use drivers::{ObjectStat, StorageDriver};

use crate::GatewayState;

pub async fn handler(
    State(state): State<GatewayState>,
    method: Method,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    if !is_valid_bucket(&bucket) {
        return not_found_response();
    }
    let key = key.trim_end_matches('/');
    if key.is_empty() {
        return not_found_response();
    }

    if method == Method::HEAD {
        let flight_key = format!("{bucket}/{key}");
        let looked_up = state
            .inflight
            .try_run(&flight_key, state.driver.perform_stat(&bucket, key))
            .await;
        let stat = match looked_up {
            Some(result) => result,
            // Someone else is already mid-lookup for this object; do our own.
            None => state.driver.perform_stat(&bucket, key).await,
        };
        return match stat {
            Ok(stat) if stat.exists => object_response(&stat, Body::empty()),
            Ok(_) => not_found_response(),
            Err(e) => error_response(&bucket, key, e),
        };
    }

    match state.driver.perform_read(&bucket, key).await {
        Ok(read) if read.stat.exists => {
            let body = match read.stream {
                Some(stream) => Body::from_stream(stream),
                None => Body::empty(),
            };
            object_response(&read.stat, body)
        }
        Ok(_) => not_found_response(),
        Err(e) => error_response(&bucket, key, e),
    }
}

fn object_response(stat: &ObjectStat, body: Body) -> Response {
    let mut builder = Response::builder().status(StatusCode::OK);
    if let Some(content_type) = &stat.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    if let Some(length) = stat.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }
    if let Some(etag) = &stat.etag {
        builder = builder.header(header::ETAG, etag);
    }
    if let Some(last_modified) = stat.last_modified {
        builder = builder.header(header::LAST_MODIFIED, imf_fixdate(last_modified));
    }
    builder.body(body).unwrap_or_else(|_| {
        (StatusCode::INTERNAL_SERVER_ERROR, "Error: malformed object metadata").into_response()
    })
}

/// RFC 7231 IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
fn imf_fixdate(when: DateTime<Utc>) -> String {
    when.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn is_valid_bucket(bucket: &str) -> bool {
    !bucket.is_empty()
        && bucket
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn not_found_response() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

fn error_response(bucket: &str, key: &str, error: drivers::DriverError) -> Response {
    tracing::error!(bucket, key, error = ?error, "read failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Error: failed to read object").into_response()
}
