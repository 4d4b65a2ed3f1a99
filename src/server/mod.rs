//! HTTP server layer for the tile cache server.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      GET /{zoom}/{x}/{y}.png          GET /api/health/          │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (requests, error codes)  │  │  (router config, tracing)   │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, tile_handler, AppState, ErrorResponse, HealthResponse, TilePathParams,
    TILE_CACHE_HIT_HEADER,
};
pub use routes::{create_router, RouterConfig};
