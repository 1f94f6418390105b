// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Native per-frame output of a detection model, before normalization
//!
//! Backends do not agree on the shape of a box's fields: the ONNX backend
//! wraps each field in a one-row container, remote detectors may send bare
//! scalars or flat lists. `RawTensor` captures all of these so that the
//! normalization step is the only place that interprets them. Values of any
//! other shape are kept as `Other` rather than failing the whole response.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Class id to human-readable name mapping provided by the model
pub type ClassNames = HashMap<usize, String>;

/// A numeric field in one of the shapes a model may emit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTensor {
    /// Bare scalar: `0.87`
    Scalar(f64),
    /// Flat list: `[0.87]` or `[x1, y1, x2, y2]`
    Flat(Vec<f64>),
    /// Wrapped list: `[[x1, y1, x2, y2]]`
    Nested(Vec<Vec<f64>>),
    /// Anything non-numeric (`"15"`, `true`, `{...}`); never interpreted
    Other(serde_json::Value),
}

impl RawTensor {
    /// Single value, either bare or wrapped in a one-element container
    pub fn as_scalar(&self) -> Option<f64> {
        let value = match self {
            RawTensor::Scalar(v) => *v,
            RawTensor::Flat(values) if values.len() == 1 => values[0],
            RawTensor::Nested(rows) if rows.len() == 1 && rows[0].len() == 1 => rows[0][0],
            _ => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Four corner values, either flat or wrapped in a one-row container
    pub fn as_quad(&self) -> Option<[f64; 4]> {
        let values: &[f64] = match self {
            RawTensor::Flat(values) => values,
            RawTensor::Nested(rows) if !rows.is_empty() => &rows[0],
            _ => return None,
        };
        if values.len() != 4 || values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some([values[0], values[1], values[2], values[3]])
    }
}

/// One raw detection as returned by the model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawBox {
    /// Absolute pixel corners `x1, y1, x2, y2`
    #[serde(default)]
    pub xyxy: Option<RawTensor>,
    /// Numeric class id
    #[serde(default)]
    pub cls: Option<RawTensor>,
    /// Confidence
    #[serde(default)]
    pub conf: Option<RawTensor>,
}

impl RawBox {
    /// Box in the wrapped layout the ONNX backend produces
    pub fn wrapped(xyxy: [f32; 4], cls: usize, conf: f32) -> Self {
        Self {
            xyxy: Some(RawTensor::Nested(vec![xyxy
                .iter()
                .map(|v| f64::from(*v))
                .collect()])),
            cls: Some(RawTensor::Flat(vec![cls as f64])),
            conf: Some(RawTensor::Flat(vec![f64::from(conf)])),
        }
    }
}

/// Everything one model invocation produced for one frame
#[derive(Debug, Clone, Default)]
pub struct RawDetections {
    /// Boxes in model order
    pub boxes: Vec<RawBox>,
    /// Id to name mapping, when the model exposes one
    pub names: Option<Arc<ClassNames>>,
}

impl RawDetections {
    pub fn new(boxes: Vec<RawBox>, names: Option<Arc<ClassNames>>) -> Self {
        Self { boxes, names }
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}
