//! Route definitions for web server.

use axum::{routing::get, Router};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::whatsapp::PairingState;

use super::pairing_page::pairing_page;

/// Upper bound on requests served at once.
const MAX_CONCURRENT_REQUESTS: usize = 64;

/// Create the full app router.
pub fn create_app_router(pairing: PairingState) -> Router {
    Router::new()
        .route("/", get(pairing_page))
        .route("/health", get(health_check))
        .with_state(pairing)
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
