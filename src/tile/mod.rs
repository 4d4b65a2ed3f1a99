//! Tile service layer.
//!
//! This module provides the cache-aside logic for serving map tiles:
//! coordinates, the persistent disk cache and the service that ties the cache
//! to the render gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  CacheStore  │  │  In-flight map  │  │
//! │  │  (PNG files  │  │  (single-flight │  │
//! │  │   on disk)   │  │   renders)      │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ on miss
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             RenderGateway               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileCoord`]: zoom/x/y tile address
//! - [`CacheStore`]: write-once PNG files under `<root>/<zoom>/<x>/<y>.png`
//! - [`TileService`]: cache check, render on miss, write-through, serve
//! - [`TileResponse`]: tile bytes plus whether they came from the cache
//!
//! # Example
//!
//! ```
//! use tile_cache_server::tile::{CacheStore, TileCoord};
//! use std::path::Path;
//!
//! let store = CacheStore::new("cache");
//! let path = store.path_for(TileCoord::new(13, 4091, 2740));
//! assert_eq!(path, Path::new("cache/13/4091/2740.png"));
//! ```

mod cache;
mod coord;
mod png;
mod service;

pub use cache::{CacheStore, TILE_EXTENSION};
pub use coord::TileCoord;
pub use png::{validate_png, PNG_CONTENT_TYPE};
pub use service::{TileResponse, TileService};
