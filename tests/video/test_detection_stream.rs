// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Detection stream task driven by in-memory frames
//!
//! These tests verify that:
//! - The running caption is published after each frame and never shrinks
//! - The caption entry is completed when the source ends
//! - The held upload is deleted when the source ends or the client leaves

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use detect_caption_node::video::{
    spawn_detection_stream, CaptionSink, CaptionStatus, CaptionStore, FrameProducer,
    StreamSettings, VideoError,
};
use detect_caption_node::vision::detection::{Annotator, RawBox};
use detect_caption_node::{DetectionPipeline, UploadGuard};
use image::{Rgb, RgbImage};
use tokio::sync::mpsc;

use crate::common::FakeModel;

/// Hands out a fixed number of solid frames, optionally failing at the end
struct MemoryFrames {
    frames: VecDeque<RgbImage>,
    fail_at_end: bool,
}

impl MemoryFrames {
    fn new(count: usize) -> Self {
        Self {
            frames: (0..count).map(|_| blank()).collect(),
            fail_at_end: false,
        }
    }

    fn failing_after(count: usize) -> Self {
        Self {
            fail_at_end: true,
            ..Self::new(count)
        }
    }
}

#[async_trait]
impl FrameProducer for MemoryFrames {
    async fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        match self.frames.pop_front() {
            Some(frame) => Ok(Some(frame)),
            None if self.fail_at_end => Err(VideoError::Decode("truncated packet".into())),
            None => Ok(None),
        }
    }
}

/// Frames fed one at a time by the test
struct FedFrames {
    rx: mpsc::Receiver<RgbImage>,
}

#[async_trait]
impl FrameProducer for FedFrames {
    async fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        Ok(self.rx.recv().await)
    }
}

fn blank() -> RgbImage {
    RgbImage::from_pixel(100, 100, Rgb([30, 30, 30]))
}

fn car() -> RawBox {
    RawBox::wrapped([0.0, 0.0, 50.0, 40.0], 2, 0.9)
}

fn person() -> RawBox {
    RawBox::wrapped([60.0, 10.0, 90.0, 90.0], 0, 0.77)
}

fn pipeline(model: FakeModel) -> DetectionPipeline {
    DetectionPipeline::new(Arc::new(model), Arc::new(Annotator::without_font()))
}

fn upload_file(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("upload_1_clip.mp4");
    std::fs::write(&path, b"video bytes").unwrap();
    path
}

async fn wait_until_removed(path: &Path) {
    for _ in 0..100 {
        if !path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{} still exists", path.display());
}

fn ready(caption: &str, labels: &[&str], complete: bool) -> CaptionStatus {
    CaptionStatus::Ready {
        caption: caption.to_string(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        complete,
    }
}

#[tokio::test]
async fn test_running_caption_through_stream() {
    let dir = tempfile::tempdir().unwrap();
    let upload = upload_file(dir.path());
    let store = Arc::new(CaptionStore::default());
    let key = "upload_1_clip.mp4";
    store.register(key).await;

    let pipeline = pipeline(FakeModel::scripted(vec![
        Ok(vec![car()]),
        Ok(vec![]),
        Ok(vec![car(), person()]),
    ]));
    let settings = StreamSettings::for_pipeline(&pipeline);
    let sink = CaptionSink {
        store: store.clone(),
        key: key.to_string(),
    };
    let (feed, rx) = mpsc::channel(1);
    let mut frames = spawn_detection_stream(
        pipeline,
        FedFrames { rx },
        settings,
        Some(sink),
        Some(UploadGuard::new(&upload)),
    );

    // the caption is published before its frame is handed over
    let mut seen = Vec::new();
    for _ in 0..3 {
        feed.send(blank()).await.unwrap();
        let jpeg = frames.recv().await.unwrap();
        let frame = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((frame.width(), frame.height()), (100, 100));
        seen.push(store.status(key).await);
    }
    drop(feed);
    assert!(frames.recv().await.is_none());

    assert_eq!(
        seen,
        vec![
            ready("The video contains: car.", &["car"], false),
            ready("The video contains: car.", &["car"], false),
            ready("The video contains: car, person.", &["car", "person"], false),
        ]
    );
    assert_eq!(
        store.status(key).await,
        ready("The video contains: car, person.", &["car", "person"], true)
    );
    wait_until_removed(&upload).await;
}

#[tokio::test]
async fn test_stream_without_detections_stays_processing() {
    let dir = tempfile::tempdir().unwrap();
    let upload = upload_file(dir.path());
    let store = Arc::new(CaptionStore::default());
    let key = "upload_1_clip.mp4";
    store.register(key).await;

    let pipeline = pipeline(FakeModel::returning(vec![]));
    let settings = StreamSettings::for_pipeline(&pipeline);
    let sink = CaptionSink {
        store: store.clone(),
        key: key.to_string(),
    };
    let mut frames = spawn_detection_stream(
        pipeline,
        MemoryFrames::new(2),
        settings,
        Some(sink),
        Some(UploadGuard::new(&upload)),
    );
    while frames.recv().await.is_some() {}

    assert_eq!(
        store.status(key).await,
        CaptionStatus::Processing {
            caption: String::new(),
            complete: true,
        }
    );
    wait_until_removed(&upload).await;
}

#[tokio::test]
async fn test_client_disconnect_deletes_upload() {
    let dir = tempfile::tempdir().unwrap();
    let upload = upload_file(dir.path());
    let store = Arc::new(CaptionStore::default());
    let key = "upload_1_clip.mp4";
    store.register(key).await;

    let model = Arc::new(FakeModel::returning(vec![car()]));
    let pipeline = DetectionPipeline::new(model.clone(), Arc::new(Annotator::without_font()));
    let settings = StreamSettings::for_pipeline(&pipeline);
    let sink = CaptionSink {
        store: store.clone(),
        key: key.to_string(),
    };
    let mut frames = spawn_detection_stream(
        pipeline,
        MemoryFrames::new(50),
        settings,
        Some(sink),
        Some(UploadGuard::new(&upload)),
    );

    assert!(frames.recv().await.is_some());
    drop(frames);

    wait_until_removed(&upload).await;
    // one frame delivered, one buffered, one in flight when the send failed
    assert!(model.calls() <= 3);
    assert_eq!(
        store.status(key).await,
        ready("The video contains: car.", &["car"], true)
    );
}

#[tokio::test]
async fn test_decode_error_ends_stream_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let upload = upload_file(dir.path());

    let pipeline = pipeline(FakeModel::returning(vec![car()]));
    let settings = StreamSettings::for_pipeline(&pipeline);
    let mut frames = spawn_detection_stream(
        pipeline,
        MemoryFrames::failing_after(2),
        settings,
        None,
        Some(UploadGuard::new(&upload)),
    );

    let mut count = 0;
    while frames.recv().await.is_some() {
        count += 1;
    }
    assert_eq!(count, 2);
    wait_until_removed(&upload).await;
}

#[tokio::test]
async fn test_model_failure_ends_stream() {
    let dir = tempfile::tempdir().unwrap();
    let upload = upload_file(dir.path());

    let pipeline = pipeline(FakeModel::scripted(vec![
        Ok(vec![car()]),
        Err("session poisoned".to_string()),
    ]));
    let settings = StreamSettings::for_pipeline(&pipeline);
    let mut frames = spawn_detection_stream(
        pipeline,
        MemoryFrames::new(5),
        settings,
        None,
        Some(UploadGuard::new(&upload)),
    );

    let mut count = 0;
    while frames.recv().await.is_some() {
        count += 1;
    }
    assert_eq!(count, 1);
    wait_until_removed(&upload).await;
}
