//! Tile Service: cache-aside orchestration.
//!
//! The TileService is the main entry point for tile requests. It orchestrates:
//! - Cache lookups on disk
//! - Rendering through the render gateway on a miss
//! - Write-through persistence of rendered tiles
//!
//! # Request Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         get_tile()                              │
//! │                                                                 │
//! │  CHECK_CACHE ──hit──► SERVE                                     │
//! │       │                                                         │
//! │      miss                                                       │
//! │       ▼                                                         │
//! │    RENDER ──no data──► NOT_FOUND (nothing cached)               │
//! │       │                                                         │
//! │      tile                                                       │
//! │       ▼                                                         │
//! │    PERSIST ──ok or failed──► SERVE (in-memory bytes)            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Single-Flight Rendering
//!
//! Concurrent misses for the same coordinate share one render. The first
//! request spawns a task that renders and persists the tile; later requests
//! for the same coordinate subscribe to that task's result. Because the work
//! runs in its own task, a leading request that times out or is dropped does
//! not strand the others.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_RENDER_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::error::{RenderError, TileError};
use crate::render::{RenderGateway, RenderOutput};

use super::cache::CacheStore;
use super::coord::TileCoord;
use super::png::validate_png;

/// Shared result slot of an in-flight render.
type RenderSlot = watch::Receiver<Option<Result<Bytes, TileError>>>;

/// Renders currently in progress, keyed by coordinate.
type InFlightMap = Arc<Mutex<HashMap<TileCoord, RenderSlot>>>;

// =============================================================================
// Tile Response
// =============================================================================

/// Response from the tile service.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// The encoded PNG tile
    pub data: Bytes,

    /// Whether this tile was served from the disk cache
    pub cache_hit: bool,
}

// =============================================================================
// Tile Service
// =============================================================================

/// Cache-aside tile service.
///
/// # Type Parameters
///
/// * `G` - The render gateway used on cache misses
///
/// # Example
///
/// ```ignore
/// use tile_cache_server::tile::{CacheStore, TileCoord, TileService};
///
/// let service = TileService::new(CacheStore::new("cache"), gateway);
/// let response = service.get_tile(TileCoord::new(13, 4091, 2740)).await?;
///
/// println!("{} bytes, cache hit: {}", response.data.len(), response.cache_hit);
/// ```
pub struct TileService<G: RenderGateway> {
    /// Persistent tile storage
    store: Arc<CacheStore>,

    /// Renderer used on cache misses
    gateway: Arc<G>,

    /// In-flight renders for single-flight coalescing
    in_flight: InFlightMap,

    /// Deadline for a whole tile request
    request_timeout: Duration,

    /// Deadline for a single render call
    render_timeout: Duration,
}

impl<G: RenderGateway> TileService<G> {
    /// Create a new tile service with default timeouts.
    pub fn new(store: CacheStore, gateway: G) -> Self {
        Self::with_shared_gateway(store, Arc::new(gateway))
    }

    /// Create a new tile service around a shared gateway.
    pub fn with_shared_gateway(store: CacheStore, gateway: Arc<G>) -> Self {
        Self {
            store: Arc::new(store),
            gateway,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            render_timeout: Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS),
        }
    }

    /// Set the deadline covering a whole tile request.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the deadline for a single render call.
    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Get a tile, rendering and caching it on a miss.
    ///
    /// # Errors
    ///
    /// - [`TileError::NoData`] if the renderer has nothing for this tile
    /// - [`TileError::Render`] if rendering failed or timed out
    /// - [`TileError::StorageRead`] if a cached entry could not be read
    /// - [`TileError::Timeout`] if the request deadline expired
    ///
    /// A failure to persist a rendered tile is not an error: the rendered
    /// bytes are still returned.
    pub async fn get_tile(&self, coord: TileCoord) -> Result<TileResponse, TileError> {
        match tokio::time::timeout(self.request_timeout, self.fetch(coord)).await {
            Ok(result) => result,
            Err(_) => Err(TileError::Timeout(self.request_timeout)),
        }
    }

    async fn fetch(&self, coord: TileCoord) -> Result<TileResponse, TileError> {
        if self.store.exists(coord).await {
            let data = self
                .store
                .read(coord)
                .await
                .map_err(TileError::StorageRead)?;

            debug!(zoom = coord.zoom, x = coord.x, y = coord.y, "Cache hit");
            return Ok(TileResponse {
                data,
                cache_hit: true,
            });
        }

        let data = self.render_coalesced(coord).await?;
        Ok(TileResponse {
            data,
            cache_hit: false,
        })
    }

    /// Join the in-flight render for `coord`, starting one if none exists.
    async fn render_coalesced(&self, coord: TileCoord) -> Result<Bytes, TileError> {
        let mut slot = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match in_flight.get(&coord) {
                Some(slot) => {
                    debug!(%coord, "Joining in-flight render");
                    slot.clone()
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    in_flight.insert(coord, rx.clone());
                    self.spawn_render(coord, tx);
                    rx
                }
            }
        };

        // Bound so the watch::Ref borrowing `slot` is dropped before `slot`
        let outcome = match slot.wait_for(Option::is_some).await {
            Ok(value) => match &*value {
                Some(result) => result.clone(),
                None => Err(TileError::Internal("render slot empty".to_string())),
            },
            Err(_) => Err(TileError::Internal(
                "render task ended without a result".to_string(),
            )),
        };
        outcome
    }

    fn spawn_render(&self, coord: TileCoord, tx: watch::Sender<Option<Result<Bytes, TileError>>>) {
        let store = Arc::clone(&self.store);
        let gateway = Arc::clone(&self.gateway);
        let render_timeout = self.render_timeout;
        let guard = InFlightGuard {
            map: Arc::clone(&self.in_flight),
            coord,
        };

        tokio::spawn(async move {
            let result = render_and_persist(&store, gateway.as_ref(), coord, render_timeout).await;

            // Unregister before publishing so newcomers see the file on disk
            drop(guard);
            let _ = tx.send(Some(result));
        });
    }

    /// Get a reference to the underlying cache store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Number of renders currently in progress.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Removes an in-flight entry when the render task finishes or unwinds.
struct InFlightGuard {
    map: InFlightMap,
    coord: TileCoord,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.coord);
    }
}

/// Render a tile and write it through to the cache.
async fn render_and_persist<G: RenderGateway>(
    store: &CacheStore,
    gateway: &G,
    coord: TileCoord,
    render_timeout: Duration,
) -> Result<Bytes, TileError> {
    let started = Instant::now();

    let output = match tokio::time::timeout(render_timeout, gateway.render(coord)).await {
        Ok(result) => result?,
        Err(_) => return Err(RenderError::Timeout(render_timeout).into()),
    };

    let data = match output {
        RenderOutput::Tile(data) => data,
        RenderOutput::NoData => {
            debug!(%coord, "Renderer has no data for tile");
            return Err(TileError::NoData { coord });
        }
    };

    validate_png(&data)?;

    info!(
        zoom = coord.zoom,
        x = coord.x,
        y = coord.y,
        bytes = data.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Rendered tile"
    );

    if let Err(e) = store.write(coord, data.clone()).await {
        warn!(
            zoom = coord.zoom,
            x = coord.x,
            y = coord.y,
            error = %e,
            "Failed to cache rendered tile, serving it uncached"
        );
    }

    Ok(data)
}

// =============================================================================
// Tests
// =============================================================================
