// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Box and label overlay for annotated frames

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::model::{DetectionModel, ModelError};
use super::normalize::DetectionBox;
use super::raw::RawDetections;

/// Box and text color
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Rectangle stroke in pixels
pub const BOX_THICKNESS: i32 = 2;

/// Label glyph height in pixels
pub const LABEL_SCALE: f32 = 16.0;

/// DejaVu Sans, used when no font is configured or the configured one fails
static BUNDLED_FONT: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSans.ttf");

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("failed to read font {path}: {source}")]
    FontRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid font data in {0}")]
    FontParse(String),
}

/// Where the label text sits relative to its box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelAnchor {
    /// 10px above the top-left corner (image and video paths)
    Above,
    /// 5px right and 15px below the top-left corner (realtime path)
    Inside,
}

impl LabelAnchor {
    /// Top-left origin of the label text for a box at `(x, y)`
    fn origin(self, x: i32, y: i32) -> (i32, i32) {
        let scale = LABEL_SCALE as i32;
        match self {
            // text is placed by its top edge; shift so the baseline lands 10px up
            LabelAnchor::Above => (x, y - 10 - scale),
            LabelAnchor::Inside => (x + 5, y + 15 - scale),
        }
    }
}

/// Draws detection boxes and labels onto frames
#[derive(Clone)]
pub struct Annotator {
    font: Option<FontArc>,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("font", &self.font.is_some())
            .finish()
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::bundled()
    }
}

impl Annotator {
    /// Annotator with the bundled label font
    pub fn bundled() -> Self {
        match FontArc::try_from_slice(BUNDLED_FONT) {
            Ok(font) => Self::with_font(font),
            Err(e) => {
                warn!("⚠️ Bundled label font unusable ({}); labels will be drawn without text", e);
                Self::without_font()
            }
        }
    }

    /// Annotator that draws label tags without glyphs
    pub fn without_font() -> Self {
        Self { font: None }
    }

    pub fn with_font(font: FontArc) -> Self {
        Self { font: Some(font) }
    }

    pub fn from_font_file(path: &Path) -> Result<Self, AnnotationError> {
        let bytes = std::fs::read(path).map_err(|source| AnnotationError::FontRead {
            path: path.display().to_string(),
            source,
        })?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|_| AnnotationError::FontParse(path.display().to_string()))?;
        Ok(Self::with_font(font))
    }

    /// Load the configured font, falling back to the bundled one
    pub fn load(font_path: Option<&Path>) -> Self {
        match font_path {
            Some(path) => match Self::from_font_file(path) {
                Ok(annotator) => {
                    info!("Loaded label font from {}", path.display());
                    annotator
                }
                Err(e) => {
                    warn!("⚠️ {}; using the bundled label font", e);
                    Self::bundled()
                }
            },
            None => {
                debug!("No label font configured, using the bundled one");
                Self::bundled()
            }
        }
    }

    pub fn font(&self) -> Option<&FontArc> {
        self.font.as_ref()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Annotated copy of `frame`: the model's own renderer when it has one,
    /// otherwise the manual overlay.
    pub fn render(
        &self,
        model: &dyn DetectionModel,
        frame: &RgbImage,
        raw: &RawDetections,
        boxes: &[DetectionBox],
        anchor: LabelAnchor,
    ) -> RgbImage {
        match model.plot(frame, raw) {
            Ok(plotted) => plotted,
            Err(e) => {
                if matches!(e, ModelError::PlotUnavailable(_)) {
                    debug!("{}", e);
                } else {
                    warn!("Model plot failed, drawing boxes manually: {}", e);
                }
                let mut copy = frame.clone();
                self.draw_boxes(&mut copy, boxes, anchor);
                copy
            }
        }
    }

    /// Draw every box and its label onto `frame` in place
    pub fn draw_boxes(&self, frame: &mut RgbImage, boxes: &[DetectionBox], anchor: LabelAnchor) {
        let (width, height) = frame.dimensions();
        for b in boxes {
            let (x, y, w, h) = b.pixel_bounds(width, height);
            for inset in 0..BOX_THICKNESS {
                let rw = w - 2 * inset;
                let rh = h - 2 * inset;
                if rw <= 0 || rh <= 0 {
                    break;
                }
                draw_hollow_rect_mut(
                    frame,
                    Rect::at(x + inset, y + inset).of_size(rw as u32, rh as u32),
                    BOX_COLOR,
                );
            }
            let (tx, ty) = anchor.origin(x, y);
            self.draw_label(frame, tx, ty, &b.display_label());
        }
    }

    fn draw_label(&self, frame: &mut RgbImage, x: i32, y: i32, text: &str) {
        let scale = PxScale::from(LABEL_SCALE);
        match &self.font {
            Some(font) => draw_text_mut(frame, BOX_COLOR, x, y, scale, font, text),
            None => {
                // no glyphs available: mark the label position with a small tag
                let tag_w = (text.len() as u32 * 4).max(4);
                draw_filled_rect_mut(
                    frame,
                    Rect::at(x, y).of_size(tag_w, LABEL_SCALE as u32 / 2),
                    BOX_COLOR,
                );
            }
        }
    }
}
