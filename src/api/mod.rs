// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod detect;
pub mod errors;
pub mod http_server;
pub mod multipart;
pub mod realtime;
pub mod streaming;
pub mod video;

pub use detect::{detect_handler, DetectResponse};
pub use errors::{ApiError, ErrorResponse};
pub use http_server::{create_app, start_server, AppState, HealthResponse};
pub use realtime::{RealtimeDetectResponse, RealtimeFrameResponse, RealtimeStatusResponse};
pub use streaming::{format_mjpeg_chunk, MjpegStream, MJPEG_CONTENT_TYPE};
pub use video::{ProcessVideoResponse, ProcessedVideosResponse, UploadVideoResponse};
