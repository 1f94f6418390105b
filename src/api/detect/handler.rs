// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Still-image detection handler

use std::sync::Arc;

use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use tracing::{debug, info, warn};

use super::response::DetectResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::api::multipart::read_file_field;
use crate::vision::detection::IMAGE_PREFIX;

/// POST /api/detect - Detect objects in an uploaded image
///
/// # Request
/// - multipart field `image`: encoded image (JPEG, PNG, ...)
///
/// # Response
/// - `boxes`: detections as frame fractions with label and score
/// - `caption`: distinct labels in first-seen order
///
/// # Errors
/// - 400 Bad Request: no `image` field, or the image cannot be decoded
/// - 500 Internal Server Error: the model failed or returned unusable boxes
pub async fn detect_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    let image = read_file_field(&mut multipart, "image")
        .await?
        .ok_or_else(|| ApiError::InvalidRequest("No image uploaded".to_string()))?;

    debug!(
        "Detect request: '{}' ({} bytes)",
        image.file_name,
        image.data.len()
    );

    let pipeline = state.detector.pipeline();
    let options = pipeline.options().with_prefix(IMAGE_PREFIX);
    let result = pipeline
        .detect_bytes(&image.data, &options)
        .await
        .map_err(|e| {
            warn!("Image detection failed: {}", e);
            ApiError::from(e)
        })?;

    info!(
        "Image detection complete: {} boxes, '{}'",
        result.count(),
        result.caption
    );

    Ok(Json(result.into()))
}
