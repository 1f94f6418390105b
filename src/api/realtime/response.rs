// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Realtime response types

use serde::{Deserialize, Serialize};

use crate::vision::detection::distinct_labels;
use crate::vision::{DetectionBox, DetectionResult, DetectorInfo};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeDetectResponse {
    pub boxes: Vec<DetectionBox>,
    pub caption: String,
    /// Distinct labels, first-seen order
    pub labels: Vec<String>,
    pub count: usize,
}

impl From<DetectionResult> for RealtimeDetectResponse {
    fn from(result: DetectionResult) -> Self {
        let labels = distinct_labels(&result.boxes);
        let count = result.count();
        Self {
            boxes: result.boxes,
            caption: result.caption,
            labels,
            count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeFrameResponse {
    /// `data:image/jpeg;base64,...`
    pub annotated: String,
    pub caption: String,
    pub boxes: Vec<DetectionBox>,
    pub labels: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeStatusResponse {
    pub status: String,
    pub model: DetectorInfo,
}
