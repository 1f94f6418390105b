// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod storage;
pub mod version;
pub mod video;
pub mod vision;

// Re-export main types
pub use api::{create_app, AppState};
pub use config::NodeConfig;
pub use storage::{UploadGuard, UploadStore};
pub use video::{CaptionStore, VideoError};
pub use vision::{
    DetectionBox, DetectionModel, DetectionPipeline, DetectionResult, DetectorService,
    PipelineError,
};
