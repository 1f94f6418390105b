// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::storage::UploadError;
use crate::video::VideoError;
use crate::vision::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    NotFound(String),
    InvalidRequest(String),
    ValidationError {
        field: String,
        message: String,
    },
    PayloadTooLarge {
        size: usize,
        max: usize,
    },
    /// Empty or undecodable media
    BadInput(String),
    ModelInvocation(String),
    FieldExtraction(String),
    ServiceUnavailable(String),
    InternalError(String),
}

impl ApiError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::ValidationError { .. } => "validation_error",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::BadInput(_) => "bad_input",
            ApiError::ModelInvocation(_) => "model_invocation_error",
            ApiError::FieldExtraction(_) => "field_extraction_error",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::InternalError(_) => "internal_error",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (message, details) = match self {
            ApiError::NotFound(msg)
            | ApiError::InvalidRequest(msg)
            | ApiError::BadInput(msg)
            | ApiError::ModelInvocation(msg)
            | ApiError::FieldExtraction(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::InternalError(msg) => (msg.clone(), None),
            ApiError::ValidationError { field, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                (message.clone(), Some(details))
            }
            ApiError::PayloadTooLarge { size, max } => {
                let mut details = HashMap::new();
                details.insert("size".to_string(), serde_json::Value::Number((*size).into()));
                details.insert("max".to_string(), serde_json::Value::Number((*max).into()));
                ("Upload too large".to_string(), Some(details))
            }
        };

        ErrorResponse {
            error: message,
            error_type: self.error_type().to_string(),
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::InvalidRequest(_)
            | ApiError::ValidationError { .. }
            | ApiError::BadInput(_) => 400,
            ApiError::PayloadTooLarge { .. } => 413,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::ModelInvocation(_)
            | ApiError::FieldExtraction(_)
            | ApiError::InternalError(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::PayloadTooLarge { size, max } => {
                write!(f, "Upload too large: {} bytes (max {})", size, max)
            }
            ApiError::BadInput(msg) => write!(f, "Bad input: {}", msg),
            ApiError::ModelInvocation(msg) => write!(f, "Model invocation failed: {}", msg),
            ApiError::FieldExtraction(msg) => write!(f, "Field extraction failed: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::BadInput(msg) => ApiError::BadInput(msg),
            PipelineError::ModelInvocation(e) => ApiError::ModelInvocation(e.to_string()),
            PipelineError::FieldExtraction(e) => ApiError::FieldExtraction(e.to_string()),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::EmptyFilename => ApiError::InvalidRequest(err.to_string()),
            UploadError::InvalidName(_) => ApiError::ValidationError {
                field: "filename".to_string(),
                message: err.to_string(),
            },
            UploadError::TooLarge { size, max } => ApiError::PayloadTooLarge { size, max },
            UploadError::NotFound(_) => ApiError::NotFound("Video not found".to_string()),
            UploadError::Io(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<VideoError> for ApiError {
    fn from(err: VideoError) -> Self {
        match err {
            VideoError::Detection(e) => e.into(),
            VideoError::NotFound(_) => ApiError::NotFound("Video not found".to_string()),
            VideoError::Probe(msg) => {
                ApiError::BadInput(format!("Could not open uploaded video: {}", msg))
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}
