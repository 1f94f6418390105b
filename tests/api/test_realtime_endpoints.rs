// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Realtime endpoint tests
//!
//! Frames arrive either as multipart field `frame` or as the raw body.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use detect_caption_node::create_app;
use tower::util::ServiceExt;

use crate::common::{
    body_json, cat_box, dog_box, jpeg_frame, multipart_body, test_state, FakeModel,
};

fn raw_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/octet-stream")
        .body(Body::from(body))
        .unwrap()
}

fn multipart_request(uri: &str, field: &str, data: &[u8]) -> Request<Body> {
    let (content_type, body) = multipart_body(field, "frame.jpg", data);
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", content_type)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_realtime_detect_raw_body() {
    let dir = tempfile::tempdir().unwrap();
    let model = FakeModel::returning(vec![dog_box(), cat_box(), dog_box()]);
    let app = create_app(test_state(Arc::new(model), &dir));

    let response = app
        .oneshot(raw_request("/api/realtime-detect", jpeg_frame(200, 200)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["caption"], "The frame contains dog, cat.");
    assert_eq!(body["labels"], serde_json::json!(["dog", "cat"]));
    assert_eq!(body["count"], 3);
    assert_eq!(body["boxes"].as_array().unwrap().len(), 3);
    assert!(body.get("annotated").is_none());
}

#[tokio::test]
async fn test_realtime_detect_multipart() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(Arc::new(FakeModel::returning(vec![])), &dir));

    let response = app
        .oneshot(multipart_request(
            "/api/realtime-detect",
            "frame",
            &jpeg_frame(64, 64),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["caption"], "No objects detected.");
    assert_eq!(body["count"], 0);
    assert_eq!(body["labels"], serde_json::json!([]));
}

#[tokio::test]
async fn test_realtime_detect_empty_body() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(Arc::new(FakeModel::returning(vec![])), &dir));

    let response = app
        .oneshot(raw_request("/api/realtime-detect", Vec::new()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No frame uploaded");
}

#[tokio::test]
async fn test_realtime_detect_wrong_multipart_field() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(Arc::new(FakeModel::returning(vec![])), &dir));

    let response = app
        .oneshot(multipart_request(
            "/api/realtime-detect",
            "image",
            &jpeg_frame(16, 16),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_realtime_detect_empty_frame_field() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(FakeModel::returning(vec![cat_box()]));
    let app = create_app(test_state(model.clone(), &dir));

    let response = app
        .oneshot(multipart_request("/api/realtime-detect", "frame", b""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_type"], "bad_input");
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_realtime_frame_returns_annotated_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(Arc::new(FakeModel::returning(vec![cat_box()])), &dir));

    let response = app
        .oneshot(multipart_request(
            "/api/realtime-frame",
            "frame",
            &jpeg_frame(200, 200),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["caption"], "The frame contains cat.");
    assert_eq!(body["labels"], serde_json::json!(["cat"]));
    assert_eq!(body["count"], 1);

    let annotated = body["annotated"].as_str().unwrap();
    let encoded = annotated
        .strip_prefix("data:image/jpeg;base64,")
        .expect("data URL prefix");
    let jpeg = STANDARD.decode(encoded).unwrap();
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (200, 200));
}

#[tokio::test]
async fn test_realtime_frame_undecodable() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(Arc::new(FakeModel::returning(vec![])), &dir));

    let response = app
        .oneshot(raw_request("/api/realtime-frame", b"garbage".to_vec()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_type"], "bad_input");
}

#[tokio::test]
async fn test_realtime_status() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(Arc::new(FakeModel::returning(vec![])), &dir));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/realtime-status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"]["name"], "fake-yolo");
    assert_eq!(body["model"]["classes"], 4);
}
