// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Route registration and server lifecycle tests

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use detect_caption_node::api::start_server;
use detect_caption_node::create_app;
use tokio::sync::oneshot;
use tower::util::ServiceExt;

use crate::common::{body_json, test_config, test_state, FakeModel};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_reports_model_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(Arc::new(FakeModel::returning(vec![])), &dir));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model"], "fake-yolo");
    assert_eq!(body["version"], detect_caption_node::version::VERSION);
}

#[tokio::test]
async fn test_all_routes_registered() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(Arc::new(FakeModel::returning(vec![])), &dir));

    // wrong method on a registered path is 405, never 404
    let routes = [
        (Method::GET, "/api/detect"),
        (Method::GET, "/api/upload-video"),
        (Method::POST, "/api/video-stream"),
        (Method::POST, "/api/video-caption"),
        (Method::GET, "/api/process-video"),
        (Method::POST, "/api/processed-videos"),
        (Method::POST, "/api/stream-detect"),
        (Method::GET, "/api/realtime-detect"),
        (Method::GET, "/api/realtime-frame"),
        (Method::POST, "/api/realtime-status"),
    ];
    for (method, uri) in routes {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method.clone())
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED,
            "{} {}",
            method,
            uri
        );
    }
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(Arc::new(FakeModel::returning(vec![])), &dir));

    let response = app.oneshot(get("/api/does-not-exist")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_files_served() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(Arc::new(FakeModel::returning(vec![])), &dir);
    let processed = state.config.processed_dir.clone();
    std::fs::create_dir_all(&processed).unwrap();
    std::fs::write(processed.join("processed_42.mp4"), b"fake mp4 bytes").unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(get("/static/processed/processed_42.mp4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"fake mp4 bytes");
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(Arc::new(FakeModel::returning(vec![])), &dir));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_server_creates_dirs_and_shuts_down() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.listen_addr = "127.0.0.1:0".to_string();
    let uploads = config.upload_dir.clone();
    let processed = config.processed_dir.clone();

    let detector = detect_caption_node::DetectorService::from_model(Arc::new(
        FakeModel::returning(vec![]),
    ));
    let state = Arc::new(detect_caption_node::AppState::new(
        Arc::new(detector),
        config,
    ));

    let (tx, rx) = oneshot::channel();
    let server = tokio::spawn(start_server(state, rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(uploads.is_dir());
    assert!(processed.is_dir());

    tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server stops")
        .unwrap();
    assert!(result.is_ok());
}
