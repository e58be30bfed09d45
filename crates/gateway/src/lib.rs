//! Read gateway library: shared state and router assembly.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use common::prelude::SingleFlight;
use drivers::StorageDriver;

pub mod read;

mod health;

/// Shared state for the read surface.
#[derive(Clone)]
pub struct GatewayState {
    pub driver: Arc<dyn StorageDriver>,
    pub inflight: Arc<SingleFlight>,
}

impl GatewayState {
    pub fn new(driver: Arc<dyn StorageDriver>) -> Self {
        Self {
            driver,
            inflight: Arc::new(SingleFlight::new()),
        }
    }
}

pub fn router(state: GatewayState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_origin(Any)
        .expose_headers(vec![header::ETAG, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    Router::new()
        .route("/:bucket/*key", get(read::handler))
        .nest("/_status", health::router())
        .with_state(state)
        .layer(cors)
}
