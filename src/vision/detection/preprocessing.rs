// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Letterbox preprocessing for the YOLOv8 detector

use image::{imageops, Rgb, RgbImage};
use ndarray::Array4;

/// Square input size of the detector
pub const YOLO_INPUT_SIZE: u32 = 640;

/// Gray used for letterbox padding
pub const PAD_VALUE: u8 = 114;

/// Scale and padding applied by [`letterbox`], needed to map boxes back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Factor from original to model pixels
    pub scale: f32,
    /// Left padding in model pixels
    pub pad_x: f32,
    /// Top padding in model pixels
    pub pad_y: f32,
    pub original_width: u32,
    pub original_height: u32,
}

impl Letterbox {
    pub fn new(width: u32, height: u32, target_size: u32) -> Self {
        if width == 0 || height == 0 {
            return Self {
                scale: 1.0,
                pad_x: 0.0,
                pad_y: 0.0,
                original_width: width,
                original_height: height,
            };
        }

        let scale = (target_size as f32 / width as f32).min(target_size as f32 / height as f32);
        let (new_w, new_h) = scaled_size(width, height, scale);

        Self {
            scale,
            pad_x: ((target_size - new_w) / 2) as f32,
            pad_y: ((target_size - new_h) / 2) as f32,
            original_width: width,
            original_height: height,
        }
    }

    /// Map a model-space point back to the original frame, clamped to its bounds
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let ox = (x - self.pad_x) / self.scale;
        let oy = (y - self.pad_y) / self.scale;
        (
            ox.clamp(0.0, self.original_width as f32),
            oy.clamp(0.0, self.original_height as f32),
        )
    }
}

fn scaled_size(width: u32, height: u32, scale: f32) -> (u32, u32) {
    (
        ((width as f32 * scale).round() as u32).max(1),
        ((height as f32 * scale).round() as u32).max(1),
    )
}

/// Resize preserving aspect ratio and pad to a `target_size` square
pub fn letterbox(frame: &RgbImage, target_size: u32) -> (RgbImage, Letterbox) {
    let info = Letterbox::new(frame.width(), frame.height(), target_size);
    let mut output = RgbImage::from_pixel(
        target_size,
        target_size,
        Rgb([PAD_VALUE, PAD_VALUE, PAD_VALUE]),
    );
    if frame.width() == 0 || frame.height() == 0 {
        return (output, info);
    }

    let (new_w, new_h) = scaled_size(frame.width(), frame.height(), info.scale);
    let resized = imageops::resize(frame, new_w, new_h, imageops::FilterType::Triangle);
    imageops::replace(
        &mut output,
        &resized,
        i64::from(info.pad_x as u32),
        i64::from(info.pad_y as u32),
    );
    (output, info)
}

/// Letterboxed NCHW tensor `[1, 3, 640, 640]` with values in [0, 1]
pub fn preprocess_for_yolo(frame: &RgbImage) -> (Array4<f32>, Letterbox) {
    let (padded, info) = letterbox(frame, YOLO_INPUT_SIZE);
    let size = YOLO_INPUT_SIZE as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));

    for (x, y, pixel) in padded.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (tensor, info)
}
