// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Detector loading tests
//!
//! The real-model test needs `MODEL_PATH` pointing at a YOLOv8 ONNX export.

use std::path::PathBuf;
use std::sync::Arc;

use detect_caption_node::vision::detection::IMAGE_PREFIX;
use detect_caption_node::vision::{DetectorBackend, DetectorConfig};
use detect_caption_node::{DetectorService, PipelineError};

use crate::common::{png_frame, FakeModel};

#[tokio::test]
async fn test_from_model_info() {
    let service = DetectorService::from_model(Arc::new(FakeModel::returning(vec![])));
    let info = service.info();

    assert_eq!(info.name, "fake-yolo");
    assert_eq!(info.backend, "custom");
    assert_eq!(info.classes, 4);
    assert_eq!(info.confidence_threshold, 0.25);
}

#[tokio::test]
async fn test_load_missing_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = DetectorConfig {
        backend: DetectorBackend::Onnx {
            model_path: dir.path().join("absent.onnx"),
            labels_path: None,
        },
        ..DetectorConfig::default()
    };

    let err = DetectorService::load(&config).await.err().expect("load fails");
    assert!(format!("{:#}", err).contains("absent.onnx"));
}

#[tokio::test]
async fn test_unreachable_remote_detector_fails_per_request() {
    let config = DetectorConfig {
        backend: DetectorBackend::Remote {
            endpoint: "http://127.0.0.1:9/".to_string(),
        },
        ..DetectorConfig::default()
    };

    // loading only warns; the failure surfaces on the first detection
    let service = DetectorService::load(&config).await.unwrap();
    assert_eq!(service.info().backend, "remote");
    assert_eq!(service.model_name(), "remote:http://127.0.0.1:9");

    let pipeline = service.pipeline();
    let err = pipeline
        .detect_bytes(&png_frame(32, 32), &pipeline.options())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ModelInvocation(_)));
}

#[tokio::test]
#[ignore] // Requires a YOLOv8 ONNX model at MODEL_PATH
async fn test_real_model_on_blank_frame() {
    let model_path = std::env::var("MODEL_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./models/yolov8n.onnx"));
    let config = DetectorConfig {
        backend: DetectorBackend::Onnx {
            model_path,
            labels_path: None,
        },
        ..DetectorConfig::default()
    };

    let service = DetectorService::load(&config).await.unwrap();
    let pipeline = service.pipeline();
    let result = pipeline
        .detect_bytes(
            &png_frame(320, 240),
            &pipeline.options().with_prefix(IMAGE_PREFIX),
        )
        .await
        .unwrap();

    assert!(result.boxes.iter().all(|b| (0.0..=1.0).contains(&b.score)));
    println!("caption: {}", result.caption);
}
