//! Map tile service over a published pollutant asset.
//!
//! Serves slippy-map PNG tiles rendered on demand from a tiled raster
//! asset, with an in-memory LRU cache in front of the read+render path.

pub mod handlers;
pub mod state;

use axum::{extract::Extension, routing::get, Router};
use state::AppState;
use std::sync::Arc;

/// Build the service router. Middleware layers are attached by the binary
/// so tests exercise the bare routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tiles/:z/:x/:y", get(handlers::tile_handler))
        .route("/metadata", get(handlers::metadata_handler))
        .route("/health", get(handlers::health_handler))
        .layer(Extension(state))
}
