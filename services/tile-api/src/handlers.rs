//! HTTP handlers for the tile service.

use crate::state::AppState;
use axum::extract::{Extension, Path};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use pyramid::PyramidError;
use raster_common::{InvalidTile, TileCoord, TileKey, TILE_SIZE};
use renderer::RenderError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Per-request tile failure. Never cached; mapped to an HTTP status.
#[derive(Debug, Error)]
pub enum TileError {
    #[error("invalid tile path: {0}")]
    BadPath(String),

    #[error(transparent)]
    InvalidTile(#[from] InvalidTile),

    #[error("tile read failed: {0}")]
    Read(#[from] PyramidError),

    #[error("tile rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("tile request timed out")]
    Timeout,

    #[error("tile task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let status = match &self {
            TileError::BadPath(_) | TileError::InvalidTile(_) => StatusCode::BAD_REQUEST,
            TileError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            TileError::Read(_) | TileError::Render(_) | TileError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(error = %self, "tile request failed");
        } else {
            warn!(error = %self, "tile request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

/// `GET /tiles/{z}/{x}/{y}.png`
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((z, x, y_png)): Path<(u32, u32, String)>,
) -> Result<Response, TileError> {
    let y: u32 = y_png
        .strip_suffix(".png")
        .and_then(|y| y.parse().ok())
        .ok_or_else(|| TileError::BadPath(y_png.clone()))?;
    let coord = TileCoord::new(z, x, y)?;

    let snapshot = state.snapshot().await;
    let key = TileKey::new(snapshot.metadata.asset_version, coord);

    if let Some(png) = state.cache.get(&key).await {
        debug!(z, x, y, "tile cache hit");
        return Ok(png_response(png));
    }

    let reader = snapshot.reader.clone();
    let vmin = snapshot.metadata.vmin as f32;
    let vmax = snapshot.metadata.vmax as f32;

    let render = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, TileError> {
        let values = reader.read_tile(coord)?;
        Ok(renderer::render_tile_png(
            &values, TILE_SIZE, TILE_SIZE, vmin, vmax,
        )?)
    });

    let png = match tokio::time::timeout(state.request_timeout, render).await {
        Ok(joined) => Bytes::from(joined??),
        Err(_) => return Err(TileError::Timeout),
    };

    state.cache.put(key, png.clone()).await;
    Ok(png_response(png))
}

fn png_response(png: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], png).into_response()
}

/// `GET /metadata`
pub async fn metadata_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    Json(state.snapshot().await.metadata.clone()).into_response()
}

/// `GET /health`
pub async fn health_handler() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}
