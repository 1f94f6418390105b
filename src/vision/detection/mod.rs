// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection and captioning
//!
//! Components:
//! - `model` - `DetectionModel` trait and model errors
//! - `raw` - native model output before normalization
//! - `invoke` - model call with the threshold fallback
//! - `normalize` - raw boxes to frame-relative `DetectionBox`
//! - `caption` - per-frame and running video captions
//! - `annotate` - box/label overlay
//! - `pipeline` - the combined detect-and-caption pipeline
//! - `yolo` / `remote` - model backends

pub mod annotate;
pub mod caption;
pub mod invoke;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod preprocessing;
pub mod raw;
pub mod remote;
pub mod yolo;

pub use annotate::{AnnotationError, Annotator, LabelAnchor};
pub use caption::{
    distinct_labels, frame_caption, RunningCaption, FRAME_PREFIX, IMAGE_PREFIX, NO_OBJECTS,
    VIDEO_PREFIX,
};
pub use invoke::invoke_model;
pub use model::{
    DetectionModel, InferenceOptions, ModelError, CONFIDENCE_OPTION, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use normalize::{normalize_boxes, DetectionBox, FieldError};
pub use pipeline::{DetectOptions, DetectionPipeline, DetectionResult, PipelineError};
pub use raw::{ClassNames, RawBox, RawDetections, RawTensor};
pub use remote::RemoteDetector;
pub use yolo::YoloOnnxModel;
