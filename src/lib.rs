//! # Tile Cache Server
//!
//! A cache-aside HTTP server for raster map tiles.
//!
//! Tiles are addressed by zoom/x/y. A request is answered from a persistent
//! on-disk cache when the tile was rendered before; otherwise the tile is
//! rendered through an external renderer, written to the cache and served.
//!
//! ## Features
//!
//! - **Persistent cache**: PNG files under `<cache>/<zoom>/<x>/<y>.png`, written atomically
//! - **Opaque renderer**: any [`RenderGateway`] implementation, HTTP out of the box
//! - **Single-flight rendering**: concurrent misses for one tile share one render
//! - **Availability first**: a tile that cannot be cached is still served
//! - **No negative caching**: tiles without data are never recorded as absent
//!
//! ## Architecture
//!
//! - [`tile`] - Coordinates, disk cache and the cache-aside tile service
//! - [`render`] - Render gateway trait and the HTTP renderer client
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```rust,no_run
//! use tile_cache_server::{
//!     create_router, CacheStore, HttpRenderGateway, RendererArgs, RouterConfig, TileService,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let renderer = RendererArgs {
//!         renderer_url: "http://127.0.0.1:8080".to_string(),
//!         data_host: "127.0.0.1".to_string(),
//!         keyspace: "density".to_string(),
//!         table: "points".to_string(),
//!         base_zoom: 13,
//!         render_timeout: 15,
//!     };
//!
//!     let gateway = HttpRenderGateway::new(renderer.renderer_config().unwrap()).unwrap();
//!     let service = TileService::new(CacheStore::new("cache"), gateway);
//!     let router = create_router(service, RouterConfig::default());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod render;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, RendererArgs, RendererConfig, ServeConfig};
pub use error::{RenderError, StoreError, TileError};
pub use render::{HttpRenderGateway, RenderGateway, RenderOutput};
pub use server::{
    create_router, health_handler, tile_handler, AppState, ErrorResponse, HealthResponse,
    RouterConfig, TilePathParams,
};
pub use tile::{validate_png, CacheStore, TileCoord, TileResponse, TileService, PNG_CONTENT_TYPE};
