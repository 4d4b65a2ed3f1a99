//! Router configuration for the tile cache server.
//!
//! # Route Structure
//!
//! ```text
//! /api/health/                 - Liveness check
//! /{zoom}/{x}/{y}.png          - Tile endpoint
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tile_cache_server::server::routes::{create_router, RouterConfig};
//! use tile_cache_server::tile::{CacheStore, TileService};
//!
//! let tile_service = TileService::new(CacheStore::new("cache"), gateway);
//! let router = create_router(tile_service, RouterConfig::default().with_cache_max_age(600));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, tile_handler, AppState};
use crate::config::{DEFAULT_CACHE_MAX_AGE, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::render::RenderGateway;
use crate::tile::TileService;

// =============================================================================
// Router Configuration
// =============================================================================

/// Headroom the HTTP layer adds on top of the request deadline, so a slow
/// tile is answered by the tile service's own `504` first.
pub const HTTP_TIMEOUT_GRACE: Duration = Duration::from_secs(1);

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Request deadline; every route is cut off after this plus
    /// [`HTTP_TIMEOUT_GRACE`] with `408 Request Timeout`
    pub request_timeout: Duration,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a router configuration with defaults:
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Request deadline is 15 seconds
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            enable_tracing: true,
        }
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Set the request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `tile_service` - The tile service for handling tile requests
/// * `config` - Router configuration
pub fn create_router<G>(tile_service: TileService<G>, config: RouterConfig) -> Router
where
    G: RenderGateway,
{
    let app_state = AppState::with_cache_max_age(tile_service, config.cache_max_age);

    // {filename} captures "{y}.png"; the handler strips and checks the extension
    let router = Router::new()
        .route("/api/health/", get(health_handler))
        .route("/{zoom}/{x}/{filename}", get(tile_handler::<G>))
        .with_state(app_state)
        .layer(TimeoutLayer::new(config.request_timeout + HTTP_TIMEOUT_GRACE));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

// =============================================================================
// Tests
// =============================================================================
