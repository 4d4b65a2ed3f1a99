//! Persistent on-disk tile cache.
//!
//! Tiles are stored as individual files under a root directory using the
//! layout `<root>/<zoom>/<x>/<y>.png`. The layout is part of the operator
//! contract: entries can be inspected or pruned by hand.
//!
//! # Atomic Writes
//!
//! A write goes to a uniquely named temporary file in the destination
//! directory and is then renamed over the final path. Readers either see the
//! complete previous state or the complete new file, never a truncated one.
//! If a write is interrupted the temporary file is removed when dropped.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::error::StoreError;

use super::coord::TileCoord;

/// File extension of cached tiles.
pub const TILE_EXTENSION: &str = "png";

/// Prefix of in-progress temporary files. Never matches a tile file name.
const TEMP_PREFIX: &str = ".tile-";

// =============================================================================
// Cache Store
// =============================================================================

/// Write-once tile storage on the local filesystem.
///
/// The store holds no in-memory state; it is safe to share between tasks
/// (typically via `Arc`) and between processes pointing at the same root.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `root`.
    ///
    /// The directory is not touched until the first write; call
    /// [`CacheStore::ensure_root`] to create it eagerly.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::Write {
                path: self.root.clone(),
                message: e.to_string(),
            })
    }

    /// Derive the storage path for a tile.
    ///
    /// Each number becomes its own path component, so distinct coordinates
    /// always map to distinct files.
    pub fn path_for(&self, coord: TileCoord) -> PathBuf {
        self.root
            .join(coord.zoom.to_string())
            .join(coord.x.to_string())
            .join(format!("{}.{}", coord.y, TILE_EXTENSION))
    }

    /// Check whether a tile is stored.
    ///
    /// Absence is an ordinary outcome and yields `false`.
    pub async fn exists(&self, coord: TileCoord) -> bool {
        tokio::fs::metadata(self.path_for(coord))
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    /// Read a stored tile.
    ///
    /// Fails when the entry is missing or unreadable, e.g. after it was
    /// deleted between [`CacheStore::exists`] and this call.
    pub async fn read(&self, coord: TileCoord) -> Result<Bytes, StoreError> {
        let path = self.path_for(coord);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) => Err(StoreError::Read {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Persist a tile, creating intermediate directories as needed.
    ///
    /// Writing the same bytes twice leaves the same final state. The blocking
    /// file work runs on the blocking pool and completes even if the calling
    /// future is dropped, so an entry is either fully written or absent.
    pub async fn write(&self, coord: TileCoord, data: Bytes) -> Result<(), StoreError> {
        let path = self.path_for(coord);
        let target = path.clone();

        let result = tokio::task::spawn_blocking(move || write_atomic(&target, &data)).await;

        match result {
            Ok(Ok(())) => {
                debug!(path = %path.display(), "Persisted tile");
                Ok(())
            }
            Ok(Err(e)) => Err(StoreError::Write {
                path,
                message: e.to_string(),
            }),
            Err(join_err) => Err(StoreError::Write {
                path,
                message: join_err.to_string(),
            }),
        }
    }
}

/// Write `data` to `path` through a temporary file and an atomic rename.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "tile path has no parent directory",
        )
    })?;

    // Concurrent first writers racing on the same directory are fine here
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(dir)?;

    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
