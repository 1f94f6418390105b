// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart form helpers shared by the upload endpoints

use axum::extract::{FromRequest, Request};
use axum::http::header;
use axum_extra::extract::Multipart;
use bytes::Bytes;
use tracing::debug;

use super::errors::ApiError;

/// A file field read into memory
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Client-side file name, empty when the client sent none
    pub file_name: String,
    pub data: Bytes,
}

/// Read the first field called `field`, skipping everything else
pub async fn read_file_field(
    multipart: &mut Multipart,
    field: &str,
) -> Result<Option<FilePart>, ApiError> {
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let file_name = part.file_name().unwrap_or_default().to_string();
        let data = part
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read '{}': {}", field, e)))?;
        debug!("Multipart field '{}': {} bytes", field, data.len());
        return Ok(Some(FilePart { file_name, data }));
    }
    Ok(None)
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Frame bytes from a multipart `field`, or the raw request body otherwise.
///
/// `Ok(None)` means no frame was sent at all.
pub async fn frame_from_request(req: Request, field: &str) -> Result<Option<Bytes>, ApiError> {
    if is_multipart(&req) {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        return Ok(read_file_field(&mut multipart, field).await?.map(|p| p.data));
    }

    let body = Bytes::from_request(req, &())
        .await
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    Ok((!body.is_empty()).then_some(body))
}
