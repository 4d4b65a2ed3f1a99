//! HTTP render gateway tests against a local mock renderer.
//!
//! The mock renderer listens on an ephemeral port and answers based on the
//! zoom level of the requested tile:
//!
//! - zoom 1: 200 with a PNG body
//! - zoom 2: 204 No Content
//! - zoom 3: 404 Not Found
//! - zoom 4: 500 with an error body
//! - zoom 5: 200 after a long delay
//! - zoom 6: 200 with a body that is not a PNG

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tempfile::TempDir;
use url::Url;

use tile_cache_server::config::RendererConfig;
use tile_cache_server::error::RenderError;
use tile_cache_server::render::{HttpRenderGateway, RenderGateway, RenderOutput};
use tile_cache_server::tile::{CacheStore, TileCoord, TileService};
use tile_cache_server::{create_router, RouterConfig};

use super::test_utils::{self, tile_png};

// =============================================================================
// Mock Renderer
// =============================================================================

#[derive(Clone, Default)]
struct MockRenderer {
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

async fn mock_render(
    State(mock): State<MockRenderer>,
    Path((zoom, _x, _y)): Path<(u32, u32, u32)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    mock.queries.lock().unwrap().push(query);

    match zoom {
        1 => (StatusCode::OK, [("content-type", "image/png")], tile_png()).into_response(),
        2 => StatusCode::NO_CONTENT.into_response(),
        3 => StatusCode::NOT_FOUND.into_response(),
        4 => (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response(),
        5 => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (StatusCode::OK, tile_png()).into_response()
        }
        _ => (StatusCode::OK, "definitely not a png").into_response(),
    }
}

/// Start the mock renderer and return its base URL.
async fn start_mock_renderer() -> (Url, MockRenderer) {
    let mock = MockRenderer::default();
    let app = Router::new()
        .route("/render/{zoom}/{x}/{y}", get(mock_render))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let url = Url::parse(&format!("http://{}", addr)).unwrap();
    (url, mock)
}

fn renderer_config(endpoint: Url, timeout: Duration) -> RendererConfig {
    RendererConfig {
        endpoint,
        data_host: "10.1.2.3".to_string(),
        keyspace: "density".to_string(),
        table: "points".to_string(),
        base_zoom: 13,
        timeout,
    }
}

async fn gateway() -> (HttpRenderGateway, MockRenderer) {
    let (url, mock) = start_mock_renderer().await;
    let gateway =
        HttpRenderGateway::new(renderer_config(url, Duration::from_secs(5))).unwrap();
    (gateway, mock)
}

// =============================================================================
// Gateway Behavior
// =============================================================================

#[tokio::test]
async fn test_rendered_tile_returned() {
    let (gateway, _) = gateway().await;

    let output = gateway.render(TileCoord::new(1, 0, 1)).await.unwrap();

    assert_eq!(output, RenderOutput::Tile(tile_png()));
}

#[tokio::test]
async fn test_no_content_and_not_found_mean_no_data() {
    let (gateway, _) = gateway().await;

    let output = gateway.render(TileCoord::new(2, 0, 0)).await.unwrap();
    assert_eq!(output, RenderOutput::NoData);

    let output = gateway.render(TileCoord::new(3, 0, 0)).await.unwrap();
    assert_eq!(output, RenderOutput::NoData);
}

#[tokio::test]
async fn test_server_error_is_upstream_failure() {
    let (gateway, _) = gateway().await;

    let err = gateway.render(TileCoord::new(4, 0, 0)).await.unwrap_err();

    match err {
        RenderError::Upstream { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("database unavailable"));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_renderer_times_out() {
    let (url, _) = start_mock_renderer().await;
    let gateway =
        HttpRenderGateway::new(renderer_config(url, Duration::from_millis(300))).unwrap();

    let err = gateway.render(TileCoord::new(5, 0, 0)).await.unwrap_err();

    assert!(matches!(err, RenderError::Timeout(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_data_source_forwarded_as_query() {
    let (gateway, mock) = gateway().await;

    gateway.render(TileCoord::new(1, 7, 9)).await.unwrap();

    let queries = mock.queries.lock().unwrap();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0]["host"], "10.1.2.3");
    assert_eq!(queries[0]["keyspace"], "density");
    assert_eq!(queries[0]["table"], "points");
    assert_eq!(queries[0]["base_zoom"], "13");
}

#[tokio::test]
async fn test_ping_reports_reachable_renderer() {
    let (gateway, _) = gateway().await;

    // The mock has no root route, but any answer counts as reachable
    let status = gateway.ping().await.unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Full Stack
// =============================================================================

struct HttpApp {
    router: Router,
    cache_root: std::path::PathBuf,
    _dir: TempDir,
}

async fn http_app() -> HttpApp {
    let (gateway, _) = gateway().await;
    let dir = TempDir::new().unwrap();
    let cache_root = dir.path().join("tiles");

    let service = TileService::new(CacheStore::new(&cache_root), gateway);
    let router = create_router(service, RouterConfig::new().with_tracing(false));

    HttpApp {
        router,
        cache_root,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_full_stack_miss_then_hit() {
    let app = http_app().await;

    let (status, headers, body) = test_utils::get(&app.router, "/1/4/5.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "false");
    assert_eq!(body, tile_png());

    let path = app.cache_root.join("1").join("4").join("5.png");
    assert_eq!(std::fs::read(&path).unwrap(), body.to_vec());

    let (status, headers, _) = test_utils::get(&app.router, "/1/4/5.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "true");
}

#[tokio::test]
async fn test_full_stack_status_mapping() {
    let app = http_app().await;

    let (status, _, _) = test_utils::get(&app.router, "/2/0/0.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = test_utils::get(&app.router, "/4/0/0.png").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _, _) = test_utils::get(&app.router, "/6/0/0.png").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    assert!(!app.cache_root.join("2").exists());
    assert!(!app.cache_root.join("4").exists());
    assert!(!app.cache_root.join("6").exists());
}
