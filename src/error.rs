use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::tile::TileCoord;

/// Errors raised by the on-disk tile cache.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// An entry reported as present could not be read back
    #[error("Failed to read cached tile {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// Persisting a tile failed (permissions, disk full, ...)
    #[error("Failed to write cached tile {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Errors returned by a render gateway.
///
/// These are transient failures. An authoritative "no tile here" answer is
/// not an error and is reported as [`crate::render::RenderOutput::NoData`].
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// The renderer answered with an unexpected status
    #[error("Renderer returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The renderer could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The render did not finish in time
    #[error("Render timed out after {0:?}")]
    Timeout(Duration),

    /// The renderer produced bytes that are not a PNG image
    #[error("Renderer returned an invalid image: {0}")]
    InvalidImage(String),

    /// Any other renderer-side failure
    #[error("Render failed: {0}")]
    Failed(String),
}

/// Errors that can occur while serving a tile.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// A path segment is not a non-negative decimal integer
    #[error("Invalid {segment}: {value:?} is not a non-negative integer")]
    InvalidCoordinate { segment: &'static str, value: String },

    /// The renderer has no data for this tile
    #[error("No tile at {coord}")]
    NoData { coord: TileCoord },

    /// The renderer failed; the tile may exist on retry
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// A cached entry exists but could not be read
    #[error("Storage error: {0}")]
    StorageRead(StoreError),

    /// The request deadline expired
    #[error("Tile request timed out after {0:?}")]
    Timeout(Duration),

    /// The background render task went away without a result
    #[error("Internal error: {0}")]
    Internal(String),
}
