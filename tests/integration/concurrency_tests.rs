//! Concurrency tests for single-flight rendering.
//!
//! Many simultaneous requests for an uncached tile must trigger one render,
//! and every request must receive the same bytes.

use std::time::Duration;

use axum::http::StatusCode;

use tile_cache_server::tile::TileCoord;

use super::test_utils::{get, tile_png, StubGateway, StubReply, TestApp};

#[tokio::test]
async fn test_concurrent_misses_render_once() {
    let app = TestApp::new(StubGateway::new().with_delay(Duration::from_millis(200)));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let router = app.router.clone();
        handles.push(tokio::spawn(async move {
            get(&router, "/12/2048/1361.png").await
        }));
    }

    for handle in handles {
        let (status, _, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, tile_png());
    }

    assert_eq!(app.gateway.call_count(), 1);
    assert!(app.tile_path(12, 2048, 1361).is_file());
}

#[tokio::test]
async fn test_concurrent_no_data_shared() {
    let empty = TileCoord::new(12, 0, 0);
    let gateway = StubGateway::new()
        .with_reply(empty, StubReply::NoData)
        .with_delay(Duration::from_millis(200));
    let app = TestApp::new(gateway);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let router = app.router.clone();
        handles.push(tokio::spawn(async move { get(&router, "/12/0/0.png").await }));
    }

    for handle in handles {
        let (status, _, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    assert_eq!(app.gateway.calls_for(empty), 1);

    // The shared answer is not remembered once the render finished
    let (status, _, _) = app.get("/12/0/0.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.gateway.calls_for(empty), 2);
}

#[tokio::test]
async fn test_concurrent_distinct_tiles_render_independently() {
    let app = TestApp::new(StubGateway::new().with_delay(Duration::from_millis(100)));

    let mut handles = Vec::new();
    for y in 0..8u32 {
        let router = app.router.clone();
        handles.push(tokio::spawn(async move {
            get(&router, &format!("/10/5/{}.png", y)).await
        }));
    }

    for handle in handles {
        let (status, _, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(app.gateway.call_count(), 8);
    for y in 0..8u32 {
        assert_eq!(app.gateway.calls_for(TileCoord::new(10, 5, y)), 1);
        assert!(app.tile_path(10, 5, y).is_file());
    }
}
