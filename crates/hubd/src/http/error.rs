//! Translation of the hub error taxonomy to HTTP, done once for every
//! handler on the write surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use common::prelude::HubError;
use common::principal::PrincipalError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Hub(#[from] HubError),

    #[error("invalid principal: {0}")]
    InvalidPrincipal(#[from] PrincipalError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidPrincipal(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Hub(HubError::Validation(m)) => (StatusCode::UNAUTHORIZED, m.clone()),
            ApiError::Hub(e @ HubError::NotEnoughProof(_)) => {
                (StatusCode::PAYMENT_REQUIRED, e.to_string())
            }
            ApiError::Hub(HubError::PayloadTooLarge(m)) => {
                (StatusCode::PAYLOAD_TOO_LARGE, m.clone())
            }
            ApiError::Hub(e @ HubError::ConflictingName(_)) => {
                (StatusCode::FORBIDDEN, e.to_string())
            }
            ApiError::Hub(e @ HubError::Driver(_)) if e.is_does_not_exist() => {
                (StatusCode::NOT_FOUND, e.to_string())
            }
            ApiError::Hub(HubError::Driver(e)) => {
                // Backend details are logged, never echoed to the client.
                tracing::error!(error = ?e, "driver failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
