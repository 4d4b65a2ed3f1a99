//! HTTP request handlers for the tile API.
//!
//! This module contains the Axum handlers for serving tiles and health checks.
//!
//! # Endpoints
//!
//! - `GET /{zoom}/{x}/{y}.png` - Serve a tile
//! - `GET /api/health/` - Liveness check

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{RenderError, TileError};
use crate::render::RenderGateway;
use crate::tile::{TileCoord, TileService, PNG_CONTENT_TYPE, TILE_EXTENSION};

/// Response header reporting whether the tile came from the disk cache.
pub const TILE_CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-tile-cache-hit");

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<G: RenderGateway> {
    /// The tile service for processing tile requests
    pub tile_service: Arc<TileService<G>>,

    /// Cache-Control max-age in seconds sent with tiles
    pub cache_max_age: u32,
}

impl<G: RenderGateway> AppState<G> {
    /// Create a new application state with custom cache max-age.
    pub fn with_cache_max_age(tile_service: TileService<G>, cache_max_age: u32) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            cache_max_age,
        }
    }
}

impl<G: RenderGateway> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            tile_service: Arc::clone(&self.tile_service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from `/{zoom}/{x}/{filename}` where filename is `{y}.png`.
/// Segments are kept as strings so malformed numbers get a proper
/// `invalid_coordinate` response instead of a generic extractor rejection.
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    /// Zoom level segment
    pub zoom: String,

    /// Column segment
    pub x: String,

    /// Row segment with the `.png` extension
    pub filename: String,
}

impl TilePathParams {
    /// The row segment without its `.png` extension.
    ///
    /// Returns `None` when the extension is missing.
    pub fn y(&self) -> Option<&str> {
        self.filename
            .strip_suffix(TILE_EXTENSION)
            .and_then(|rest| rest.strip_suffix('.'))
    }

    /// Parse the path into a tile coordinate.
    pub fn coord(&self) -> Result<Option<TileCoord>, TileError> {
        match self.y() {
            Some(y) => TileCoord::from_segments(&self.zoom, &self.x, y).map(Some),
            None => Ok(None),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_coordinate")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    pub status: u16,
}

impl ErrorResponse {
    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: status.as_u16(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `true` while the process is serving requests
    pub ok: bool,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert TileError to HTTP response.
///
/// Messages are generic for server-side failures; the detailed error (which
/// may contain file paths or renderer URLs) only goes to the log:
/// - 5xx errors are logged at ERROR level
/// - 404 is logged at DEBUG level
/// - other 4xx errors are logged at WARN level
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            // 400 Bad Request
            TileError::InvalidCoordinate { .. } => (
                StatusCode::BAD_REQUEST,
                "invalid_coordinate",
                self.to_string(),
            ),

            // 404 Not Found
            TileError::NoData { coord } => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("No tile at {}", coord),
            ),

            // 5xx - renderer failures
            TileError::Render(RenderError::Timeout(_)) => (
                StatusCode::GATEWAY_TIMEOUT,
                "render_timeout",
                "Tile rendering timed out".to_string(),
            ),
            TileError::Render(_) => (
                StatusCode::BAD_GATEWAY,
                "render_error",
                "Tile rendering failed".to_string(),
            ),

            // 5xx - local failures
            TileError::StorageRead(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Cached tile could not be read".to_string(),
            ),
            TileError::Timeout(duration) => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                format!("Tile request timed out after {}s", duration.as_secs_f32()),
            ),
            TileError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                self
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        error_response(status, error_type, message)
    }
}

fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    let body = ErrorResponse::with_status(error_type, message, status);
    (status, Json(body)).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /{zoom}/{x}/{y}.png`
///
/// # Response
///
/// - `200 OK`: PNG tile
/// - `400 Bad Request`: a coordinate is not a non-negative integer
/// - `404 Not Found`: no data for this tile, or the path does not end in `.png`
/// - `5xx`: rendering failed, the cache could not be read, or the request
///   timed out
///
/// # Headers
///
/// - `Content-Type: image/png`
/// - `Access-Control-Allow-Origin: *`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Tile-Cache-Hit: true|false`
pub async fn tile_handler<G: RenderGateway>(
    State(state): State<AppState<G>>,
    Path(params): Path<TilePathParams>,
) -> Result<Response, TileError> {
    let Some(coord) = params.coord()? else {
        return Ok(error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            "Tile paths must end in .png".to_string(),
        ));
    };

    let response = state.tile_service.get_tile(coord).await?;

    let headers = [
        (header::CONTENT_TYPE, PNG_CONTENT_TYPE.to_string()),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        (
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        ),
        (TILE_CACHE_HIT_HEADER, response.cache_hit.to_string()),
    ];

    Ok((StatusCode::OK, headers, response.data).into_response())
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /api/health/`
///
/// # Response
///
/// `200 OK` with JSON body `{"ok": true}`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

// =============================================================================
// Tests
// =============================================================================
