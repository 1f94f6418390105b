// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Still-image detection response types

use serde::{Deserialize, Serialize};

use crate::vision::{DetectionBox, DetectionResult};

/// Response from still-image detection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectResponse {
    /// Detected objects in model order
    pub boxes: Vec<DetectionBox>,
    /// `"The image contains ..."` or `"No objects detected."`
    pub caption: String,
}

impl From<DetectionResult> for DetectResponse {
    fn from(result: DetectionResult) -> Self {
        Self {
            boxes: result.boxes,
            caption: result.caption,
        }
    }
}
