// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption derivation
//!
//! Two policies exist and are intentionally kept apart:
//! - [`frame_caption`]: one frame, distinct labels in first-seen order
//! - [`RunningCaption`]: one video, accumulated labels in sorted order

use std::collections::BTreeSet;

use super::normalize::DetectionBox;

/// Caption for a frame or video without any detection
pub const NO_OBJECTS: &str = "No objects detected.";

/// Prefix for still images
pub const IMAGE_PREFIX: &str = "The image contains ";

/// Prefix for realtime frames
pub const FRAME_PREFIX: &str = "The frame contains ";

/// Prefix for the running video caption
pub const VIDEO_PREFIX: &str = "The video contains: ";

/// Distinct labels in the order they first appear
pub fn distinct_labels(boxes: &[DetectionBox]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for b in boxes {
        if !labels.iter().any(|l| l == &b.label) {
            labels.push(b.label.clone());
        }
    }
    labels
}

/// Single-frame caption: `<prefix>dog, cat.`
pub fn frame_caption(prefix: &str, boxes: &[DetectionBox]) -> String {
    let labels = distinct_labels(boxes);
    if labels.is_empty() {
        return NO_OBJECTS.to_string();
    }
    format!("{}{}.", prefix, labels.join(", "))
}

/// Label set accumulated across every frame of one video. It never shrinks.
#[derive(Debug, Clone, Default)]
pub struct RunningCaption {
    labels: BTreeSet<String>,
}

impl RunningCaption {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame's boxes in and return the caption after that frame
    pub fn observe(&mut self, boxes: &[DetectionBox]) -> String {
        for b in boxes {
            self.labels.insert(b.label.clone());
        }
        self.caption()
    }

    pub fn caption(&self) -> String {
        if self.labels.is_empty() {
            return NO_OBJECTS.to_string();
        }
        let joined = self
            .labels
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}{}.", VIDEO_PREFIX, joined)
    }

    /// Sorted labels seen so far
    pub fn labels(&self) -> Vec<String> {
        self.labels.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Caption worth publishing to pollers; `None` until something was detected
    pub fn published(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.caption())
    }
}
