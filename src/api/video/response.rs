// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadVideoResponse {
    /// Saved upload name; pass back as `video_path`
    pub video_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessVideoResponse {
    pub status: String,
    /// Public URL of the processed file
    pub url: String,
    pub frames_processed: u64,
    pub total_frames: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedVideosResponse {
    /// Newest first
    pub videos: Vec<String>,
}
