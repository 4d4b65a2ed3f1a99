//! Configuration management for the tile cache server.
//!
//! Configuration is read once at startup from command-line arguments and
//! environment variables (prefix `TILES_`) and then passed by value into the
//! components that need it. Nothing reads configuration mid-request.
//!
//! # Environment Variables
//!
//! - `TILES_HOST` - Server bind address (default: 0.0.0.0)
//! - `TILES_PORT` - Server port (default: 5000)
//! - `TILES_CACHE_DIR` - Tile cache root directory (default: cache)
//! - `TILES_RENDERER_URL` - Base URL of the renderer (default: http://127.0.0.1:8080)
//! - `TILES_DATA_HOST` - Data store host forwarded to the renderer (default: 127.0.0.1)
//! - `TILES_KEYSPACE` - Keyspace forwarded to the renderer (default: density)
//! - `TILES_TABLE` - Table forwarded to the renderer (default: points)
//! - `TILES_BASE_ZOOM` - Base zoom forwarded to the renderer (default: 13)
//! - `TILES_REQUEST_TIMEOUT` - Per-request deadline in seconds (default: 15)
//! - `TILES_RENDER_TIMEOUT` - Per-render deadline in seconds (default: 15)
//! - `TILES_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::tile::TileCoord;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default tile cache directory.
pub const DEFAULT_CACHE_DIR: &str = "cache";

/// Default renderer endpoint.
pub const DEFAULT_RENDERER_URL: &str = "http://127.0.0.1:8080";

/// Default data store host handed to the renderer.
pub const DEFAULT_DATA_HOST: &str = "127.0.0.1";

/// Default keyspace handed to the renderer.
pub const DEFAULT_KEYSPACE: &str = "density";

/// Default table handed to the renderer.
pub const DEFAULT_TABLE: &str = "points";

/// Default base zoom handed to the renderer.
pub const DEFAULT_BASE_ZOOM: u32 = 13;

/// Default per-request deadline in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Default per-render deadline in seconds.
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 15;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// Highest base zoom accepted.
pub const MAX_BASE_ZOOM: u32 = 30;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tile Cache Server - serves rendered map tiles from a disk cache.
///
/// Tiles missing from the cache are rendered through an external renderer,
/// written to disk and served.
#[derive(Parser, Debug, Clone)]
#[command(name = "tile-cache-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// Resolve the command to run, defaulting to `serve`.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the tile server (default)
    Serve(ServeConfig),

    /// Check the cache directory and renderer connectivity, then exit
    Check(CheckConfig),
}

/// Arguments shared by every command that talks to the renderer.
#[derive(Args, Debug, Clone)]
pub struct RendererArgs {
    /// Base URL of the renderer.
    #[arg(long, default_value = DEFAULT_RENDERER_URL, env = "TILES_RENDERER_URL")]
    pub renderer_url: String,

    /// Data store host the renderer should query.
    #[arg(long, default_value = DEFAULT_DATA_HOST, env = "TILES_DATA_HOST")]
    pub data_host: String,

    /// Keyspace the renderer should query.
    #[arg(long, default_value = DEFAULT_KEYSPACE, env = "TILES_KEYSPACE")]
    pub keyspace: String,

    /// Table the renderer should query.
    #[arg(long, default_value = DEFAULT_TABLE, env = "TILES_TABLE")]
    pub table: String,

    /// Zoom level at which the renderer's source data is stored.
    #[arg(long, default_value_t = DEFAULT_BASE_ZOOM, env = "TILES_BASE_ZOOM")]
    pub base_zoom: u32,

    /// Maximum time in seconds a single render may take.
    #[arg(long, default_value_t = DEFAULT_RENDER_TIMEOUT_SECS, env = "TILES_RENDER_TIMEOUT")]
    pub render_timeout: u64,
}

impl RendererArgs {
    /// Validate renderer arguments.
    pub fn validate(&self) -> Result<(), String> {
        let url = Url::parse(&self.renderer_url)
            .map_err(|e| format!("Invalid renderer URL '{}': {}", self.renderer_url, e))?;

        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "Renderer URL must be an http(s) URL, got '{}'",
                self.renderer_url
            ));
        }

        if self.base_zoom > MAX_BASE_ZOOM {
            return Err(format!("base_zoom must be at most {}", MAX_BASE_ZOOM));
        }

        if self.render_timeout == 0 {
            return Err("render_timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Build the renderer configuration (call `validate()` first).
    pub fn renderer_config(&self) -> Result<RendererConfig, String> {
        let endpoint = Url::parse(&self.renderer_url)
            .map_err(|e| format!("Invalid renderer URL '{}': {}", self.renderer_url, e))?;

        Ok(RendererConfig {
            endpoint,
            data_host: self.data_host.clone(),
            keyspace: self.keyspace.clone(),
            table: self.table.clone(),
            base_zoom: self.base_zoom,
            timeout: Duration::from_secs(self.render_timeout),
        })
    }
}

/// Configuration for the `serve` command.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TILES_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TILES_PORT")]
    pub port: u16,

    /// Maximum time in seconds to answer a tile request.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, env = "TILES_REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "TILES_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Root directory of the tile cache.
    #[arg(long = "cache-dir", default_value = DEFAULT_CACHE_DIR, env = "TILES_CACHE_DIR")]
    pub cache_dir: PathBuf,

    // =========================================================================
    // Renderer Configuration
    // =========================================================================
    #[command(flatten)]
    pub renderer: RendererArgs,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err("Cache directory is required. Set --cache-dir or TILES_CACHE_DIR".to_string());
        }

        if self.request_timeout == 0 {
            return Err("request_timeout must be greater than 0".to_string());
        }

        self.renderer.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The per-request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Configuration for the `check` command.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Root directory of the tile cache.
    #[arg(long = "cache-dir", default_value = DEFAULT_CACHE_DIR, env = "TILES_CACHE_DIR")]
    pub cache_dir: PathBuf,

    #[command(flatten)]
    pub renderer: RendererArgs,

    /// Render one tile ("zoom/x/y") through the renderer as a smoke test.
    #[arg(long, value_parser = parse_probe_tile)]
    pub probe_tile: Option<TileCoord>,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

fn parse_probe_tile(value: &str) -> Result<TileCoord, String> {
    let parts: Vec<&str> = value.split('/').collect();
    match parts.as_slice() {
        [zoom, x, y] => TileCoord::from_segments(zoom, x, y).map_err(|e| e.to_string()),
        _ => Err(format!("expected zoom/x/y, got '{}'", value)),
    }
}

// =============================================================================
// Renderer Configuration
// =============================================================================

/// Connection parameters for the renderer.
///
/// Built once at startup and handed to the render gateway. The data-store
/// fields are opaque to everything except the renderer itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Base URL of the renderer
    pub endpoint: Url,

    /// Data store host
    pub data_host: String,

    /// Keyspace identifier
    pub keyspace: String,

    /// Table identifier
    pub table: String,

    /// Zoom level of the source data
    pub base_zoom: u32,

    /// Deadline for a single render call
    pub timeout: Duration,
}

// =============================================================================
// Tests
// =============================================================================
