// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Detect Caption Node

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-detect-caption-2025-11-03";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

/// Major version number
pub const VERSION_MAJOR: u32 = 0;

/// Minor version number
pub const VERSION_MINOR: u32 = 1;

/// Patch version number
pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2025-11-03";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "image-detection",
    "video-upload",
    "mjpeg-video-stream",
    "running-video-caption",
    "batch-video-processing",
    "realtime-frame-detection",
    "realtime-annotated-frame",
    "camera-stream",
    "onnx-yolov8",
    "remote-detector",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Detect Caption Node {} ({})", VERSION_NUMBER, BUILD_DATE)
}
