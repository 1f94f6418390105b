// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Video endpoints
//!
//! - POST /api/upload-video - save an upload for streaming
//! - GET /api/video-stream - MJPEG detection stream over an upload
//! - GET /api/video-caption - running caption of a streamed upload
//! - POST /api/process-video - annotate and re-encode a whole video
//! - GET /api/processed-videos - processed video URLs
//! - GET /api/stream-detect - MJPEG detection stream from the camera

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{
    process_video_handler, processed_videos_handler, stream_detect_handler,
    upload_video_handler, video_caption_handler, video_stream_handler,
};
pub use request::VideoPathQuery;
pub use response::{ProcessVideoResponse, ProcessedVideosResponse, UploadVideoResponse};
