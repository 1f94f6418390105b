// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model invocation with the threshold-parameter fallback

use image::RgbImage;
use tracing::{debug, warn};

use super::model::{DetectionModel, InferenceOptions, ModelError};
use super::raw::RawDetections;

/// Invoke the model with a confidence threshold.
///
/// If the model rejects the threshold parameter, it is called once more
/// without it. Any other error is returned untouched.
pub async fn invoke_model(
    model: &dyn DetectionModel,
    frame: &RgbImage,
    threshold: f32,
) -> Result<RawDetections, ModelError> {
    match model
        .infer(frame, InferenceOptions::with_confidence(threshold))
        .await
    {
        Err(ModelError::UnsupportedOption(option)) => {
            warn!(
                "{} rejected parameter '{}', retrying without it",
                model.name(),
                option
            );
            model.infer(frame, InferenceOptions::default()).await
        }
        other => {
            if let Ok(ref raw) = other {
                debug!("{} returned {} raw boxes", model.name(), raw.boxes.len());
            }
            other
        }
    }
}
