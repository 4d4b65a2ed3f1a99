//! Render gateway: the boundary to the external tile renderer.
//!
//! The tile service only ever talks to a renderer through the
//! [`RenderGateway`] trait. Whatever the renderer does internally (data store
//! queries, connection pooling, its own caching) stays behind this boundary.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! └────────────────────┬────────────────────┘
//!                      │ render(coord)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          RenderGateway Trait            │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          HttpRenderGateway              │
//! │  (remote renderer over HTTP)            │
//! └─────────────────────────────────────────┘
//! ```

mod http;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::RenderError;
use crate::tile::TileCoord;

pub use self::http::HttpRenderGateway;

/// Outcome of a successful call to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutput {
    /// An encoded PNG tile
    Tile(Bytes),

    /// The renderer has no data for this coordinate.
    ///
    /// This is an authoritative answer, not a failure.
    NoData,
}

/// A renderer capable of producing tiles on demand.
///
/// Calls may be slow (network or database bound). Implementations must not
/// block the async runtime.
#[async_trait]
pub trait RenderGateway: Send + Sync + 'static {
    /// Render the tile at `coord`.
    ///
    /// Returns `Ok(RenderOutput::NoData)` when the renderer authoritatively
    /// has nothing for this tile, and `Err` for failures that may succeed on
    /// retry.
    async fn render(&self, coord: TileCoord) -> Result<RenderOutput, RenderError>;
}

#[async_trait]
impl<G: RenderGateway + ?Sized> RenderGateway for Arc<G> {
    async fn render(&self, coord: TileCoord) -> Result<RenderOutput, RenderError> {
        (**self).render(coord).await
    }
}
