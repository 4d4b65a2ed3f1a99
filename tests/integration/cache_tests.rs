//! Disk cache integration tests.
//!
//! These tests verify that:
//! - Entries already on disk are served without rendering
//! - A tile that cannot be persisted is still served, and cached once
//!   storage recovers
//! - A cached entry that cannot be read is a server error, not a re-render
//! - Writes leave no temporary files behind

use axum::http::StatusCode;
use tempfile::TempDir;

use super::test_utils::{json_body, make_png, tile_png, StubGateway, TestApp};

#[tokio::test]
async fn test_preexisting_entry_served_verbatim() {
    let app = TestApp::new(StubGateway::new());

    // Seed the cache as a previous run would have left it
    let seeded = make_png(64, 64, 123);
    let path = app.tile_path(9, 300, 200);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, &seeded).unwrap();

    let (status, headers, body) = app.get("/9/300/200.png").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "true");
    assert_eq!(body, seeded);
    assert_eq!(app.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_cache_root_created_on_first_write() {
    let app = TestApp::new(StubGateway::new());
    assert!(!app.cache_root.exists());

    let (status, _, _) = app.get("/1/0/1.png").await;

    assert_eq!(status, StatusCode::OK);
    assert!(app.cache_root.is_dir());
    assert!(app.tile_path(1, 0, 1).is_file());
}

#[tokio::test]
async fn test_write_failure_still_serves_tile() {
    let dir = TempDir::new().unwrap();
    let cache_root = dir.path().join("cache");

    // A regular file where the cache root should be makes every write fail
    std::fs::write(&cache_root, b"not a directory").unwrap();

    let app = TestApp::with_cache_root(StubGateway::new(), cache_root, dir);

    let (status, headers, body) = app.get("/13/4091/2740.png").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "false");
    assert_eq!(body, tile_png());
    assert!(!app.tile_path(13, 4091, 2740).exists());

    // Nothing was cached, so the next request renders again
    let (status, _, _) = app.get("/13/4091/2740.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.gateway.call_count(), 2);
}

#[tokio::test]
async fn test_tile_cached_after_storage_recovers() {
    let dir = TempDir::new().unwrap();
    let cache_root = dir.path().join("cache");
    std::fs::write(&cache_root, b"not a directory").unwrap();

    let app = TestApp::with_cache_root(StubGateway::new(), cache_root.clone(), dir);

    let (status, _, _) = app.get("/13/4091/2740.png").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.tile_path(13, 4091, 2740).exists());

    // Clear the fault; the next render is persisted
    std::fs::remove_file(&cache_root).unwrap();

    let (status, headers, body) = app.get("/13/4091/2740.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "false");
    assert!(app.tile_path(13, 4091, 2740).is_file());
    assert_eq!(
        std::fs::read(app.tile_path(13, 4091, 2740)).unwrap(),
        body.to_vec()
    );

    let (status, headers, body) = app.get("/13/4091/2740.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "true");
    assert_eq!(body, tile_png());
    assert_eq!(app.gateway.call_count(), 2);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_unreadable_entry_is_storage_error() {
    let app = TestApp::new(StubGateway::new());

    // /proc/self/mem reports as a regular file but reading offset 0 fails
    let path = app.tile_path(1, 1, 1);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::os::unix::fs::symlink("/proc/self/mem", &path).unwrap();

    let (status, headers, body) = app.get("/1/1/1.png").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(headers.get("content-type").unwrap(), "application/json");

    let json = json_body(&body);
    assert_eq!(json["error"], "storage_error");
    assert_eq!(json["status"], 500);

    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(!text.contains(app.cache_root.to_str().unwrap()));
    assert!(!text.contains("/proc"));

    // A present entry is never bypassed with a fresh render
    assert_eq!(app.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_directory_at_tile_path_is_a_miss() {
    let app = TestApp::new(StubGateway::new());

    // A directory named like the tile is not a cache entry
    std::fs::create_dir_all(app.tile_path(4, 4, 4)).unwrap();

    let (status, headers, body) = app.get("/4/4/4.png").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "false");
    assert_eq!(body, tile_png());
    assert_eq!(app.gateway.call_count(), 1);
}

#[tokio::test]
async fn test_no_temporary_files_left_behind() {
    let app = TestApp::new(StubGateway::new());

    for uri in ["/6/10/20.png", "/6/10/21.png", "/6/10/22.png"] {
        let (status, _, _) = app.get(uri).await;
        assert_eq!(status, StatusCode::OK);
    }

    let mut names: Vec<String> = std::fs::read_dir(app.cache_root.join("6").join("10"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    assert_eq!(names, vec!["20.png", "21.png", "22.png"]);
}
