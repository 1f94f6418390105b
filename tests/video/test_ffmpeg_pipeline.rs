// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end video tests against a real ffmpeg binary
//!
//! Run with `cargo test --test video_tests -- --ignored` on a machine with
//! `ffmpeg` and `ffprobe` on PATH.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use detect_caption_node::video::{
    probe_video, process_video, spawn_detection_stream, CaptionSink, CaptionStore,
    FinalizeOutcome, FrameSource, StreamSettings,
};
use detect_caption_node::vision::detection::Annotator;
use detect_caption_node::{DetectionPipeline, UploadGuard};
use ffmpeg_sidecar::command::FfmpegCommand;

use crate::common::{cat_box, FakeModel};

/// Ten 160x120 frames of the lavfi test pattern
fn make_clip(dir: &Path) -> PathBuf {
    let path = dir.join("clip.mp4");
    let mut child = FfmpegCommand::new()
        .hide_banner()
        .overwrite()
        .args(["-f", "lavfi", "-i", "testsrc=duration=1:size=160x120:rate=10"])
        .output(path.to_string_lossy().as_ref())
        .spawn()
        .unwrap();
    for _ in child.iter().unwrap() {}
    assert!(child.wait().unwrap().success());
    path
}

fn pipeline(model: FakeModel) -> DetectionPipeline {
    DetectionPipeline::new(Arc::new(model), Arc::new(Annotator::without_font()))
}

#[tokio::test]
#[ignore] // Requires ffmpeg and ffprobe
async fn test_generated_clip_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(dir.path());

    let info = probe_video(Path::new("ffprobe"), &clip).unwrap();
    assert_eq!((info.width, info.height), (160, 120));
    assert!((info.fps - 10.0).abs() < 0.01);
}

#[tokio::test]
#[ignore] // Requires ffmpeg and ffprobe
async fn test_process_video_writes_h264_output() {
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(dir.path());
    let processed = dir.path().join("processed");
    let model = Arc::new(FakeModel::returning(vec![cat_box()]));
    let pipeline = DetectionPipeline::new(model.clone(), Arc::new(Annotator::without_font()));

    let summary = process_video(
        &pipeline,
        Path::new("ffmpeg"),
        Path::new("ffprobe"),
        &clip,
        &processed,
        1234,
    )
    .await
    .unwrap();

    assert_eq!(summary.file_name, "processed_1234.mp4");
    assert_eq!(summary.url(), "/static/processed/processed_1234.mp4");
    assert_eq!(summary.frames_processed, 10);
    assert_eq!(model.calls(), 10);
    assert_eq!(summary.outcome, FinalizeOutcome::Transcoded);
    assert!(summary.output.is_file());

    // only the final file remains
    let names: Vec<_> = std::fs::read_dir(&processed)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["processed_1234.mp4".to_string()]);

    let info = probe_video(Path::new("ffprobe"), &summary.output).unwrap();
    assert_eq!((info.width, info.height), (160, 120));
}

#[tokio::test]
#[ignore] // Requires ffmpeg
async fn test_process_video_model_failure_leaves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(dir.path());
    let processed = dir.path().join("processed");
    let model = FakeModel::scripted(vec![Ok(vec![]), Ok(vec![]), Err("out of memory".into())]);

    let result = process_video(
        &pipeline(model),
        Path::new("ffmpeg"),
        Path::new("ffprobe"),
        &clip,
        &processed,
        1,
    )
    .await;
    assert!(result.is_err());

    let leftovers = std::fs::read_dir(&processed)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
#[ignore] // Requires ffmpeg
async fn test_stream_publishes_caption_and_deletes_upload() {
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(dir.path());
    let store = Arc::new(CaptionStore::default());
    let key = "clip.mp4".to_string();
    store.register(&key).await;

    let pipeline = pipeline(FakeModel::returning(vec![cat_box()]));
    let source = FrameSource::open_file(Path::new("ffmpeg"), &clip).unwrap();
    let settings = StreamSettings::for_pipeline(&pipeline);
    let sink = CaptionSink {
        store: store.clone(),
        key: key.clone(),
    };
    let mut frames = spawn_detection_stream(
        pipeline,
        source,
        settings,
        Some(sink),
        Some(UploadGuard::new(&clip)),
    );

    let mut count = 0;
    while let Some(jpeg) = frames.recv().await {
        let frame = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((frame.width(), frame.height()), (160, 120));
        count += 1;
    }
    assert_eq!(count, 10);

    // the task drops its guard after the last send
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(!clip.exists());

    let json = serde_json::to_value(store.status(&key).await).unwrap();
    assert_eq!(json["status"], "ready");
    assert_eq!(json["caption"], "The video contains: cat.");
    assert_eq!(json["complete"], true);
}

#[tokio::test]
#[ignore] // Requires ffmpeg
async fn test_stream_stops_when_client_leaves() {
    let dir = tempfile::tempdir().unwrap();
    let clip = make_clip(dir.path());
    let model = Arc::new(FakeModel::returning(vec![]));
    let pipeline = DetectionPipeline::new(model.clone(), Arc::new(Annotator::without_font()));

    let source = FrameSource::open_file(Path::new("ffmpeg"), &clip).unwrap();
    let settings = StreamSettings::for_pipeline(&pipeline);
    let mut frames = spawn_detection_stream(
        pipeline,
        source,
        settings,
        None,
        Some(UploadGuard::new(&clip)),
    );

    assert!(frames.recv().await.is_some());
    drop(frames);

    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    assert!(!clip.exists());
    // one frame delivered, at most one buffered and one in flight
    assert!(model.calls() <= 3);
}
