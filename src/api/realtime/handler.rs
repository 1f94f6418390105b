// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Realtime frame handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use bytes::Bytes;
use tracing::{debug, info, warn};

use super::response::{RealtimeDetectResponse, RealtimeFrameResponse, RealtimeStatusResponse};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::api::multipart::frame_from_request;
use crate::vision::detection::{distinct_labels, FRAME_PREFIX};
use crate::vision::image_utils::{encode_jpeg, jpeg_data_url};
use crate::vision::{DetectionResult, LabelAnchor};

async fn read_frame(req: Request) -> Result<Bytes, ApiError> {
    let frame = frame_from_request(req, "frame")
        .await?
        .ok_or_else(|| ApiError::InvalidRequest("No frame uploaded".to_string()))?;
    if frame.is_empty() {
        return Err(ApiError::BadInput("Empty frame buffer received".to_string()));
    }
    Ok(frame)
}

async fn run_frame(
    state: &AppState,
    frame: &[u8],
    anchor: Option<LabelAnchor>,
) -> Result<DetectionResult, ApiError> {
    let pipeline = state.detector.pipeline();
    let mut options = pipeline.options().with_prefix(FRAME_PREFIX);
    if let Some(anchor) = anchor {
        options = options.with_annotation(anchor);
    }
    let result = pipeline.detect_bytes(frame, &options).await.map_err(|e| {
        warn!("Realtime detection failed: {}", e);
        ApiError::from(e)
    })?;
    info!(
        "[realtime] detections={} labels={:?}",
        result.count(),
        distinct_labels(&result.boxes)
    );
    Ok(result)
}

/// POST /api/realtime-detect - Boxes and caption for one frame
///
/// Accepts the frame as multipart field `frame` or as the raw request body.
pub async fn realtime_detect_handler(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<RealtimeDetectResponse>, ApiError> {
    let frame = read_frame(req).await?;
    debug!("Realtime detect: {} bytes", frame.len());
    let result = run_frame(&state, &frame, None).await?;
    Ok(Json(result.into()))
}

/// POST /api/realtime-frame - Annotated frame plus boxes and caption
pub async fn realtime_frame_handler(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<RealtimeFrameResponse>, ApiError> {
    let frame = read_frame(req).await?;
    debug!("Realtime frame: {} bytes", frame.len());
    let result = run_frame(&state, &frame, Some(LabelAnchor::Inside)).await?;

    let annotated = result
        .annotated_frame
        .as_ref()
        .ok_or_else(|| ApiError::InternalError("Annotated frame missing".to_string()))?;
    let jpeg = encode_jpeg(annotated)
        .map_err(|e| ApiError::InternalError(format!("Failed to encode frame: {}", e)))?;

    let labels = distinct_labels(&result.boxes);
    let count = result.count();
    Ok(Json(RealtimeFrameResponse {
        annotated: jpeg_data_url(&jpeg),
        caption: result.caption,
        boxes: result.boxes,
        labels,
        count,
    }))
}

/// GET /api/realtime-status - Detector status
pub async fn realtime_status_handler(
    State(state): State<Arc<AppState>>,
) -> Json<RealtimeStatusResponse> {
    Json(RealtimeStatusResponse {
        status: "ok".to_string(),
        model: state.detector.info(),
    })
}
