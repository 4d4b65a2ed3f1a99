//! Tile coordinates in the standard zoom/x/y pyramid.

use std::fmt;

use crate::error::TileError;

/// A tile address in the zoom/x/y pyramid.
///
/// Two coordinates with the same triple are the same tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Zoom level
    pub zoom: u32,

    /// Column (0-indexed from the west)
    pub x: u32,

    /// Row (0-indexed from the north)
    pub y: u32,
}

impl TileCoord {
    /// Create a new tile coordinate.
    pub const fn new(zoom: u32, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Parse a coordinate from raw path segments.
    ///
    /// Each segment must consist solely of ASCII digits. Signs, whitespace,
    /// radix prefixes and values that overflow `u32` are rejected.
    pub fn from_segments(zoom: &str, x: &str, y: &str) -> Result<Self, TileError> {
        Ok(Self {
            zoom: parse_segment("zoom", zoom)?,
            x: parse_segment("x", x)?,
            y: parse_segment("y", y)?,
        })
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

fn parse_segment(segment: &'static str, value: &str) -> Result<u32, TileError> {
    let invalid = || TileError::InvalidCoordinate {
        segment,
        value: value.to_string(),
    };

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    value.parse().map_err(|_| invalid())
}
