// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Pipeline behaviour across frames
//!
//! These tests verify that:
//! - Each frame is captioned from its own boxes only
//! - The running video caption accumulates and never shrinks
//! - Annotation falls back to the manual overlay without a model renderer

use std::sync::Arc;

use detect_caption_node::vision::detection::annotate::BOX_COLOR;
use detect_caption_node::vision::detection::{
    Annotator, DetectOptions, LabelAnchor, RawBox, RunningCaption, FRAME_PREFIX, NO_OBJECTS,
};
use detect_caption_node::{DetectionPipeline, PipelineError};
use image::{Rgb, RgbImage};

use crate::common::{cat_box, FakeModel};

fn car_box() -> RawBox {
    RawBox::wrapped([0.0, 0.0, 50.0, 40.0], 2, 0.9)
}

fn person_box() -> RawBox {
    RawBox::wrapped([60.0, 10.0, 90.0, 90.0], 0, 0.77)
}

fn pipeline(model: FakeModel) -> DetectionPipeline {
    DetectionPipeline::new(Arc::new(model), Arc::new(Annotator::without_font()))
}

fn frame() -> RgbImage {
    RgbImage::from_pixel(100, 100, Rgb([10, 10, 10]))
}

#[tokio::test]
async fn test_frames_are_captioned_independently() {
    let pipeline = pipeline(FakeModel::scripted(vec![
        Ok(vec![car_box()]),
        Ok(vec![]),
        Ok(vec![car_box(), person_box()]),
    ]));
    let options = DetectOptions::default().with_prefix(FRAME_PREFIX);

    let mut captions = Vec::new();
    for _ in 0..3 {
        let result = pipeline.detect(&frame(), &options).await.unwrap();
        captions.push(result.caption);
    }

    assert_eq!(
        captions,
        vec![
            "The frame contains car.".to_string(),
            NO_OBJECTS.to_string(),
            "The frame contains car, person.".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_running_caption_never_shrinks() {
    let pipeline = pipeline(FakeModel::scripted(vec![
        Ok(vec![car_box()]),
        Ok(vec![]),
        Ok(vec![car_box(), person_box()]),
    ]));

    let mut running = RunningCaption::new();
    let mut published = Vec::new();
    for _ in 0..3 {
        let (_, boxes) = pipeline.detect_raw(&frame(), 0.25).await.unwrap();
        running.observe(&boxes);
        published.push(running.published());
    }

    assert_eq!(
        published,
        vec![
            Some("The video contains: car.".to_string()),
            Some("The video contains: car.".to_string()),
            Some("The video contains: car, person.".to_string()),
        ]
    );
    assert_eq!(running.labels(), vec!["car", "person"]);
}

#[tokio::test]
async fn test_annotation_draws_box_outline() {
    let pipeline = pipeline(FakeModel::returning(vec![cat_box()]));
    let options = DetectOptions::default().with_annotation(LabelAnchor::Above);

    let result = pipeline
        .detect(&RgbImage::from_pixel(200, 200, Rgb([0, 0, 0])), &options)
        .await
        .unwrap();
    let annotated = result.annotated_frame.expect("annotated frame");

    assert_eq!(annotated.dimensions(), (200, 200));
    // left edge of the cat box at (10, 20)..(110, 120)
    assert_eq!(*annotated.get_pixel(10, 70), BOX_COLOR);
    // interior untouched
    assert_eq!(*annotated.get_pixel(60, 70), Rgb([0, 0, 0]));
}

#[tokio::test]
async fn test_no_annotation_unless_requested() {
    let pipeline = pipeline(FakeModel::returning(vec![cat_box()]));
    let result = pipeline
        .detect(&frame(), &DetectOptions::default())
        .await
        .unwrap();
    assert!(result.annotated_frame.is_none());
    assert_eq!(result.count(), 1);
}

#[tokio::test]
async fn test_zero_sized_frame_is_bad_input() {
    let model = Arc::new(FakeModel::returning(vec![cat_box()]));
    let pipeline = DetectionPipeline::new(model.clone(), Arc::new(Annotator::without_font()));

    let err = pipeline
        .detect(&RgbImage::new(0, 0), &DetectOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::BadInput(_)));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_configured_threshold_reaches_model() {
    let model = Arc::new(FakeModel::returning(vec![]));
    let pipeline = DetectionPipeline::new(model.clone(), Arc::new(Annotator::without_font()))
        .with_default_threshold(0.6);

    pipeline.detect(&frame(), &pipeline.options()).await.unwrap();
    assert_eq!(model.seen_options()[0].confidence, Some(0.6));
}
