// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection model seam
//!
//! Every backend (local ONNX session, remote detector, test fakes) implements
//! `DetectionModel`. The pipeline only sees this trait.

use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

use std::sync::Arc;

use super::raw::{ClassNames, RawDetections};

/// Default confidence threshold passed to the model
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

/// Name of the optional confidence parameter, as reported in interface mismatches
pub const CONFIDENCE_OPTION: &str = "conf";

/// Per-call options; every field is optional for the model to honour
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InferenceOptions {
    /// Minimum confidence for a detection to be reported
    pub confidence: Option<f32>,
}

impl InferenceOptions {
    pub fn with_confidence(threshold: f32) -> Self {
        Self {
            confidence: Some(threshold),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    /// The model's interface does not accept an optional parameter
    #[error("model does not accept parameter '{0}'")]
    UnsupportedOption(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("plot rendering not available for {0}")]
    PlotUnavailable(String),

    #[error("plot rendering failed: {0}")]
    PlotFailed(String),
}

impl ModelError {
    pub fn is_interface_mismatch(&self) -> bool {
        matches!(self, ModelError::UnsupportedOption(_))
    }
}

/// A loaded object-detection model
#[async_trait]
pub trait DetectionModel: Send + Sync {
    /// Short model identifier for logs and status responses
    fn name(&self) -> &str;

    /// Id to name mapping, when the model carries one
    fn class_names(&self) -> Option<Arc<ClassNames>> {
        None
    }

    /// Run the model on one RGB frame
    async fn infer(
        &self,
        frame: &RgbImage,
        options: InferenceOptions,
    ) -> Result<RawDetections, ModelError>;

    /// Model-native rendering of a result onto a copy of the frame
    fn plot(&self, _frame: &RgbImage, _raw: &RawDetections) -> Result<RgbImage, ModelError> {
        Err(ModelError::PlotUnavailable(self.name().to_string()))
    }
}
