// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Translation of raw model boxes into frame-relative `DetectionBox` records

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::raw::{ClassNames, RawBox, RawDetections};

/// One detected object, positioned as fractions of the frame size
///
/// `x + w` and `y + h` may exceed 1.0 when the model reports boxes that
/// overhang the frame edge; such values are passed through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub label: String,
    /// Confidence rounded to 2 decimals
    pub score: f64,
}

impl DetectionBox {
    /// Pixel bounds `(x, y, w, h)` in a frame of the given size, truncated like
    /// integer casts of the fractional coordinates.
    pub fn pixel_bounds(&self, width: u32, height: u32) -> (i32, i32, i32, i32) {
        (
            (self.x * f64::from(width)) as i32,
            (self.y * f64::from(height)) as i32,
            (self.w * f64::from(width)) as i32,
            (self.h * f64::from(height)) as i32,
        )
    }

    /// Overlay text: label plus score as an integer percentage
    pub fn display_label(&self) -> String {
        format!("{} {}%", self.label, (self.score * 100.0) as i64)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    #[error("box {index}: coordinates missing")]
    MissingCoordinates { index: usize },

    #[error("box {index}: coordinates are not four finite numbers")]
    MalformedCoordinates { index: usize },
}

/// Round a confidence to 2 decimals, clamped to [0, 1]
pub fn round_score(confidence: f64) -> f64 {
    (confidence.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

fn class_id(raw: &RawBox) -> usize {
    match raw.cls.as_ref().and_then(|t| t.as_scalar()) {
        Some(v) if v >= 0.0 => v as usize,
        _ => 0,
    }
}

fn confidence(raw: &RawBox) -> f64 {
    raw.conf
        .as_ref()
        .and_then(|t| t.as_scalar())
        .unwrap_or(0.0)
}

fn resolve_label(names: Option<&ClassNames>, id: usize) -> String {
    names
        .and_then(|n| n.get(&id))
        .cloned()
        .unwrap_or_else(|| id.to_string())
}

/// Normalize every raw box against a frame of `width` x `height` pixels.
///
/// Class id and confidence fail closed to `0` / `0.0`. Coordinates have no
/// safe default, so a box without usable corners fails the whole frame.
pub fn normalize_boxes(
    raw: &RawDetections,
    width: u32,
    height: u32,
) -> Result<Vec<DetectionBox>, FieldError> {
    let fw = f64::from(width);
    let fh = f64::from(height);
    let names = raw.names.as_deref();

    raw.boxes
        .iter()
        .enumerate()
        .map(|(index, b)| {
            let xyxy = b
                .xyxy
                .as_ref()
                .ok_or(FieldError::MissingCoordinates { index })?;
            let [x1, y1, x2, y2] = xyxy
                .as_quad()
                .ok_or(FieldError::MalformedCoordinates { index })?;

            Ok(DetectionBox {
                x: x1 / fw,
                y: y1 / fh,
                w: (x2 - x1) / fw,
                h: (y2 - y1) / fh,
                label: resolve_label(names, class_id(b)),
                score: round_score(confidence(b)),
            })
        })
        .collect()
}
