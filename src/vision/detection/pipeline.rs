// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection-and-caption pipeline
//!
//! `frame → model (threshold fallback) → normalized boxes → optional
//! annotation → caption`. Stateless per call; the model is shared.

use std::sync::Arc;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use super::annotate::{Annotator, LabelAnchor};
use super::caption::{frame_caption, IMAGE_PREFIX};
use super::invoke::invoke_model;
use super::model::{DetectionModel, ModelError, DEFAULT_CONFIDENCE_THRESHOLD};
use super::normalize::{normalize_boxes, DetectionBox, FieldError};
use super::raw::RawDetections;
use crate::vision::image_utils::{decode_frame, ImageError};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Empty or undecodable frame; never reported as zero detections
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("model invocation failed: {0}")]
    ModelInvocation(#[from] ModelError),

    #[error("field extraction failed: {0}")]
    FieldExtraction(#[from] FieldError),
}

impl From<ImageError> for PipelineError {
    fn from(err: ImageError) -> Self {
        PipelineError::BadInput(err.to_string())
    }
}

/// Per-call knobs
#[derive(Debug, Clone)]
pub struct DetectOptions {
    pub threshold: f32,
    /// Policy A caption prefix, e.g. `"The image contains "`
    pub caption_prefix: &'static str,
    /// Render an annotated copy with labels at this anchor
    pub annotate: Option<LabelAnchor>,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            caption_prefix: IMAGE_PREFIX,
            annotate: None,
        }
    }
}

impl DetectOptions {
    pub fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.caption_prefix = prefix;
        self
    }

    pub fn with_annotation(mut self, anchor: LabelAnchor) -> Self {
        self.annotate = Some(anchor);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Output of one pipeline call
#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Model order, no sorting or deduplication
    pub boxes: Vec<DetectionBox>,
    pub caption: String,
    pub annotated_frame: Option<RgbImage>,
}

impl DetectionResult {
    pub fn count(&self) -> usize {
        self.boxes.len()
    }
}

#[derive(Clone)]
pub struct DetectionPipeline {
    model: Arc<dyn DetectionModel>,
    annotator: Arc<Annotator>,
    default_threshold: f32,
}

impl DetectionPipeline {
    pub fn new(model: Arc<dyn DetectionModel>, annotator: Arc<Annotator>) -> Self {
        Self {
            model,
            annotator,
            default_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_default_threshold(mut self, threshold: f32) -> Self {
        self.default_threshold = threshold;
        self
    }

    pub fn model(&self) -> &Arc<dyn DetectionModel> {
        &self.model
    }

    pub fn default_threshold(&self) -> f32 {
        self.default_threshold
    }

    /// Options seeded with this pipeline's configured threshold
    pub fn options(&self) -> DetectOptions {
        DetectOptions::default().with_threshold(self.default_threshold)
    }

    /// Run the model and normalize, without caption or annotation
    pub async fn detect_raw(
        &self,
        frame: &RgbImage,
        threshold: f32,
    ) -> Result<(RawDetections, Vec<DetectionBox>), PipelineError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(PipelineError::BadInput("frame has zero dimensions".into()));
        }
        let raw = invoke_model(self.model.as_ref(), frame, threshold).await?;
        let boxes = normalize_boxes(&raw, frame.width(), frame.height())?;
        Ok((raw, boxes))
    }

    /// Full pipeline on a decoded frame
    pub async fn detect(
        &self,
        frame: &RgbImage,
        options: &DetectOptions,
    ) -> Result<DetectionResult, PipelineError> {
        let (raw, boxes) = self.detect_raw(frame, options.threshold).await?;
        let caption = frame_caption(options.caption_prefix, &boxes);
        let annotated_frame = options
            .annotate
            .map(|anchor| self.annotate(frame, &raw, &boxes, anchor));

        debug!(
            "{}x{} frame: {} boxes, caption '{}'",
            frame.width(),
            frame.height(),
            boxes.len(),
            caption
        );

        Ok(DetectionResult {
            boxes,
            caption,
            annotated_frame,
        })
    }

    /// Decode encoded image bytes, then run the full pipeline
    pub async fn detect_bytes(
        &self,
        bytes: &[u8],
        options: &DetectOptions,
    ) -> Result<DetectionResult, PipelineError> {
        let (frame, info) = decode_frame(bytes)?;
        info!(
            "Decoded {:?} frame {}x{} ({} bytes)",
            info.format, info.width, info.height, info.size_bytes
        );
        self.detect(&frame, options).await
    }

    /// Annotated copy of a frame for an existing result
    pub fn annotate(
        &self,
        frame: &RgbImage,
        raw: &RawDetections,
        boxes: &[DetectionBox],
        anchor: LabelAnchor,
    ) -> RgbImage {
        self.annotator
            .render(self.model.as_ref(), frame, raw, boxes, anchor)
    }
}
