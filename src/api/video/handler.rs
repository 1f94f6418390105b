// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Video endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Response,
    Json,
};
use axum_extra::extract::Multipart;
use tracing::{debug, info, warn};

use super::request::VideoPathQuery;
use super::response::{ProcessVideoResponse, ProcessedVideosResponse, UploadVideoResponse};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::api::multipart::{read_file_field, FilePart};
use crate::api::streaming::MjpegStream;
use crate::storage::{upload_key, UploadError, UploadGuard};
use crate::video::processor::processed_url;
use crate::video::{
    list_processed, process_video, spawn_detection_stream, CaptionSink, CaptionStatus,
    FrameSource, SourceKind, StreamSettings,
};

async fn read_video_field(
    multipart: &mut Multipart,
    missing_message: &str,
) -> Result<FilePart, ApiError> {
    let video = read_file_field(multipart, "video")
        .await?
        .ok_or_else(|| ApiError::InvalidRequest(missing_message.to_string()))?;
    if video.file_name.is_empty() {
        return Err(UploadError::EmptyFilename.into());
    }
    Ok(video)
}

/// POST /api/upload-video - Save a video for a later detection stream
///
/// Registers an empty caption entry under the saved name.
pub async fn upload_video_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadVideoResponse>, ApiError> {
    let video = read_video_field(&mut multipart, "No video uploaded").await?;
    let saved = state.uploads.save(&video.file_name, &video.data).await?;
    state.captions.register(&saved.name).await;

    Ok(Json(UploadVideoResponse {
        video_path: saved.name,
    }))
}

/// GET /api/video-stream?video_path= - MJPEG stream of annotated frames
///
/// The running caption is published per frame; the upload is deleted when
/// the stream ends for any reason.
pub async fn video_stream_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VideoPathQuery>,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound("Video not found".to_string());

    let requested = query.path().ok_or_else(not_found)?;
    let path = state.uploads.resolve(requested).map_err(|e| {
        debug!("Stream request for {} rejected: {}", requested, e);
        not_found()
    })?;
    let guard = UploadGuard::new(&path);

    let source = FrameSource::open_file(&state.config.ffmpeg_path, guard.path()).map_err(|e| {
        warn!("Could not open {}: {}", path.display(), e);
        ApiError::from(e)
    })?;

    let key = upload_key(requested);
    info!("🎥 Streaming detections for {}", key);

    let pipeline = state.detector.pipeline().clone();
    let settings = StreamSettings::for_pipeline(&pipeline);
    let sink = CaptionSink {
        store: state.captions.clone(),
        key,
    };
    let frames = spawn_detection_stream(pipeline, source, settings, Some(sink), Some(guard));

    Ok(MjpegStream::new(frames).into_response())
}

/// GET /api/video-caption?video_path= - Running caption for a streamed upload
pub async fn video_caption_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VideoPathQuery>,
) -> Result<Json<CaptionStatus>, ApiError> {
    let requested = query.path().ok_or_else(|| ApiError::ValidationError {
        field: "video_path".to_string(),
        message: "video_path required".to_string(),
    })?;
    let status = state.captions.status(&upload_key(requested)).await;
    Ok(Json(status))
}

/// POST /api/process-video - Annotate every frame and re-encode to H.264
///
/// # Response
/// - `status`: `"success"`
/// - `url`: `/static/processed/processed_<ts>.mp4`
/// - `frames_processed`, `total_frames`
pub async fn process_video_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ProcessVideoResponse>, ApiError> {
    let video = read_video_field(
        &mut multipart,
        "No video file uploaded (field name must be \"video\")",
    )
    .await?;

    let saved = state.uploads.save(&video.file_name, &video.data).await?;
    drop(video);
    let upload = UploadGuard::new(&saved.path);

    let summary = process_video(
        state.detector.pipeline(),
        &state.config.ffmpeg_path,
        &state.config.ffprobe_binary(),
        upload.path(),
        &state.config.processed_dir,
        saved.timestamp,
    )
    .await
    .map_err(|e| {
        warn!("Video processing failed for {}: {}", saved.name, e);
        ApiError::from(e)
    })?;

    Ok(Json(ProcessVideoResponse {
        status: "success".to_string(),
        url: summary.url(),
        frames_processed: summary.frames_processed,
        total_frames: summary.total_frames,
    }))
}

/// GET /api/processed-videos - URLs of processed videos, newest first
pub async fn processed_videos_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProcessedVideosResponse>, ApiError> {
    let names = list_processed(&state.config.processed_dir).await?;
    Ok(Json(ProcessedVideosResponse {
        videos: names.iter().map(|n| processed_url(n)).collect(),
    }))
}

/// GET /api/stream-detect - MJPEG stream of annotated camera frames
pub async fn stream_detect_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let kind = SourceKind::Device {
        input: state.config.camera_input.clone(),
        format: state.config.camera_format.clone(),
    };
    let source = FrameSource::open(&state.config.ffmpeg_path, &kind).map_err(|e| {
        warn!("Camera unavailable: {}", e);
        ApiError::ServiceUnavailable(format!("Camera unavailable: {}", e))
    })?;

    let pipeline = state.detector.pipeline().clone();
    let settings = StreamSettings::for_pipeline(&pipeline);
    let frames = spawn_detection_stream(pipeline, source, settings, None, None);

    Ok(MjpegStream::new(frames).into_response())
}
