//! The write-side HTTP surface.

use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;

pub mod delete_object;
pub mod error;
pub mod hub_info;
pub mod list_files;
pub mod revoke_all;
pub mod store;

mod health;

use crate::AppState;

pub fn router(state: AppState) -> Router {
    // Browser writers need permissive CORS; authorization still happens per
    // request via bearer tokens.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The transport limit sits well above the hub ceiling so that oversized
    // uploads hit the pipeline's own enforcement and report 413 with the
    // declared/observed distinction intact.
    let body_limit =
        (state.hub.config().max_file_upload_size_bytes as usize) * 2 + 1024 * 1024;

    Router::new()
        .route("/store/:principal/*path", post(store::handler))
        .route("/delete/:principal/*path", delete(delete_object::handler))
        .route("/list-files/:principal", post(list_files::handler))
        .route("/revoke-all/:principal", post(revoke_all::handler))
        .route("/hub_info", get(hub_info::handler))
        .nest("/_status", health::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Run the hub HTTP server until the shutdown channel fires.
pub async fn run(
    listen_addr: SocketAddr,
    state: AppState,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    let router = router(state).layer(trace_layer);

    tracing::info!(addr = ?listen_addr, "hub server listening");
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}
