// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module
//!
//! This module provides:
//! - Object detection with captions (YOLOv8 on ONNX Runtime, or a remote detector)
//! - Frame decoding/encoding helpers
//!
//! Detection runs on CPU; the session is shared process-wide.

pub mod detection;
pub mod image_utils;
pub mod model_manager;

pub use detection::{
    DetectOptions, DetectionBox, DetectionModel, DetectionPipeline, DetectionResult, LabelAnchor,
    PipelineError,
};
pub use image_utils::{decode_base64_frame, decode_frame, detect_format, ImageError, ImageInfo};
pub use model_manager::{DetectorBackend, DetectorConfig, DetectorInfo, DetectorService};
