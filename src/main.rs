//! Tile Cache Server - serves rendered map tiles from a disk cache.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;

use bytes::Bytes;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tile_cache_server::{
    config::{CheckConfig, Cli, Command, ServeConfig},
    render::{HttpRenderGateway, RenderGateway, RenderOutput},
    server::{create_router, RouterConfig},
    tile::{validate_png, CacheStore, TileCoord, TileService},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let renderer_config = match config.renderer.renderer_config() {
        Ok(renderer_config) => renderer_config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Tile Cache Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Cache directory: {}", config.cache_dir.display());
    info!("  Renderer: {}", renderer_config.endpoint);
    info!(
        "  Data source: host={} keyspace={} table={} base_zoom={}",
        renderer_config.data_host,
        renderer_config.keyspace,
        renderer_config.table,
        renderer_config.base_zoom
    );
    info!(
        "  Timeouts: request {}s, render {}s",
        config.request_timeout,
        renderer_config.timeout.as_secs()
    );

    let store = CacheStore::new(&config.cache_dir);
    if let Err(e) = store.ensure_root().await {
        error!("Cannot create cache directory: {}", e);
        return ExitCode::FAILURE;
    }

    let render_timeout = renderer_config.timeout;
    let gateway = match HttpRenderGateway::new(renderer_config) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("Failed to create renderer client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tile_service = TileService::new(store, gateway)
        .with_request_timeout(config.request_timeout())
        .with_render_timeout(render_timeout);

    let router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_request_timeout(config.request_timeout())
        .with_tracing(!config.no_tracing);

    let router = create_router(tile_service, router_config);

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/api/health/", addr);
    info!("    curl -o tile.png http://{}/0/0/0.png", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Resolve on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tile_cache_server=debug,tower_http=debug"
    } else {
        "tile_cache_server=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Tile Cache Server Configuration Check");
    println!("═════════════════════════════════════");
    println!();

    if let Err(e) = config.renderer.validate() {
        println!("✗ Configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let renderer_config = match config.renderer.renderer_config() {
        Ok(renderer_config) => renderer_config,
        Err(e) => {
            println!("✗ Configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    println!("✓ Renderer: {}", renderer_config.endpoint);
    println!(
        "✓ Data source: host={} keyspace={} table={} base_zoom={}",
        renderer_config.data_host,
        renderer_config.keyspace,
        renderer_config.table,
        renderer_config.base_zoom
    );
    println!();

    // Cache directory must be creatable and writable
    print!("Checking cache directory {}... ", config.cache_dir.display());
    match check_cache_dir(&CacheStore::new(&config.cache_dir)).await {
        Ok(()) => println!("✓ writable"),
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let gateway = match HttpRenderGateway::new(renderer_config) {
        Ok(gateway) => gateway,
        Err(e) => {
            println!("✗ Renderer client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    print!("Testing renderer connection... ");
    match gateway.ping().await {
        Ok(status) => println!("✓ reachable (HTTP {})", status.as_u16()),
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - The renderer is running");
            println!("  - The renderer URL is correct and reachable");
            return ExitCode::FAILURE;
        }
    }

    if let Some(coord) = config.probe_tile {
        print!("Rendering probe tile {}... ", coord);
        match probe_render(&gateway, coord).await {
            Ok(Some((width, height, len))) => {
                println!("✓ rendered {}x{} PNG ({} bytes)", width, height, len)
            }
            Ok(None) => println!("✓ renderer has no data for this tile"),
            Err(e) => {
                println!("✗ failed");
                println!();
                println!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    println!();
    println!("═════════════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}

/// Create the cache root and write/remove a probe entry.
async fn check_cache_dir(store: &CacheStore) -> Result<(), String> {
    store.ensure_root().await.map_err(|e| e.to_string())?;

    let probe_dir = store.root().join(".check");
    let probe = CacheStore::new(&probe_dir);
    let coord = TileCoord::new(0, 0, 0);

    probe
        .write(coord, Bytes::from_static(b"probe"))
        .await
        .map_err(|e| e.to_string())?;

    tokio::fs::remove_dir_all(&probe_dir)
        .await
        .map_err(|e| format!("failed to remove {}: {}", probe_dir.display(), e))
}

/// Render one tile and report its dimensions and size.
async fn probe_render(
    gateway: &HttpRenderGateway,
    coord: TileCoord,
) -> Result<Option<(u32, u32, usize)>, String> {
    match gateway.render(coord).await.map_err(|e| e.to_string())? {
        RenderOutput::Tile(data) => {
            let (width, height) = validate_png(&data).map_err(|e| e.to_string())?;
            Ok(Some((width, height, data.len())))
        }
        RenderOutput::NoData => Ok(None),
    }
}
