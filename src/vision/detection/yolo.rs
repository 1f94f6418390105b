// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOv8 object detector on ONNX Runtime
//!
//! The exported model takes a letterboxed `[1, 3, 640, 640]` tensor and
//! returns `[1, 4 + nc, N]` proposals (`cx, cy, w, h` followed by one score
//! per class). Post-processing keeps the best class per proposal, applies the
//! confidence threshold and class-aware NMS, then maps boxes back to the
//! source frame.

use std::path::Path;
use std::sync::{Arc, Mutex};

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use ndarray::{Array2, ArrayView2, Axis, Ix2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use regex::Regex;
use tracing::{debug, info, warn};

use super::model::{DetectionModel, InferenceOptions, ModelError, DEFAULT_CONFIDENCE_THRESHOLD};
use super::preprocessing::{preprocess_for_yolo, Letterbox};
use super::raw::{ClassNames, RawBox, RawDetections};

/// IoU above which a lower-scored box of the same class is suppressed
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// Upper bound on detections per frame
pub const MAX_DETECTIONS: usize = 300;

/// One post-processed detection in source-frame pixels
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub xyxy: [f32; 4],
    pub class_id: usize,
    pub confidence: f32,
}

impl Prediction {
    fn area(&self) -> f32 {
        (self.xyxy[2] - self.xyxy[0]).max(0.0) * (self.xyxy[3] - self.xyxy[1]).max(0.0)
    }

    pub fn iou(&self, other: &Prediction) -> f32 {
        let ix1 = self.xyxy[0].max(other.xyxy[0]);
        let iy1 = self.xyxy[1].max(other.xyxy[1]);
        let ix2 = self.xyxy[2].min(other.xyxy[2]);
        let iy2 = self.xyxy[3].min(other.xyxy[3]);
        if ix2 <= ix1 || iy2 <= iy1 {
            return 0.0;
        }
        let inter = (ix2 - ix1) * (iy2 - iy1);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Decode a `[4 + nc, N]` output view into thresholded, suppressed predictions
pub fn decode_predictions(
    output: ArrayView2<f32>,
    letterbox: &Letterbox,
    confidence_threshold: f32,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Prediction> {
    let (rows, proposals) = output.dim();
    if rows <= 4 {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for n in 0..proposals {
        let column = output.column(n);
        let (class_id, confidence) = column
            .iter()
            .skip(4)
            .enumerate()
            .fold((0usize, f32::MIN), |best, (c, &s)| {
                if s > best.1 {
                    (c, s)
                } else {
                    best
                }
            });
        if !confidence.is_finite() || confidence < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (column[0], column[1], column[2], column[3]);
        let (x1, y1) = letterbox.map_to_original(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.map_to_original(cx + w / 2.0, cy + h / 2.0);
        candidates.push(Prediction {
            xyxy: [x1, y1, x2, y2],
            class_id,
            confidence,
        });
    }

    non_max_suppression(candidates, iou_threshold, max_detections)
}

/// Class-aware NMS, highest confidence first
pub fn non_max_suppression(
    mut candidates: Vec<Prediction>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Prediction> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Prediction> = Vec::new();
    for candidate in candidates {
        if keep.len() >= max_detections {
            break;
        }
        let suppressed = keep.iter().any(|kept| {
            kept.class_id == candidate.class_id && kept.iou(&candidate) > iou_threshold
        });
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

/// Parse the `names` metadata entry, e.g. `{0: 'person', 1: 'bicycle'}`
pub fn parse_names_metadata(raw: &str) -> Option<ClassNames> {
    let pattern = Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#).ok()?;
    let names: ClassNames = pattern
        .captures_iter(raw)
        .filter_map(|cap| Some((cap[1].parse::<usize>().ok()?, cap[2].to_string())))
        .collect();
    (!names.is_empty()).then_some(names)
}

/// Read a labels file, one class name per non-empty line
pub fn load_labels_file(path: &Path) -> Result<ClassNames> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read labels file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(id, name)| (id, name.to_string()))
        .collect())
}

/// Deterministic per-class color for the native plot
pub fn class_color(class_id: usize) -> Rgb<u8> {
    const PALETTE: [[u8; 3]; 10] = [
        [255, 56, 56],
        [255, 157, 151],
        [255, 112, 31],
        [255, 178, 29],
        [207, 210, 49],
        [72, 249, 10],
        [26, 147, 52],
        [0, 212, 187],
        [44, 153, 168],
        [0, 194, 255],
    ];
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// YOLOv8 detector backed by an ONNX Runtime session
#[derive(Clone)]
pub struct YoloOnnxModel {
    /// ONNX Runtime session; runs are serialized
    session: Arc<Mutex<Session>>,
    input_name: String,
    names: Option<Arc<ClassNames>>,
    confidence_threshold: f32,
    iou_threshold: f32,
    font: Option<FontArc>,
    name: String,
}

impl std::fmt::Debug for YoloOnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloOnnxModel")
            .field("name", &self.name)
            .field("input_name", &self.input_name)
            .field("classes", &self.names.as_ref().map(|n| n.len()))
            .field("confidence_threshold", &self.confidence_threshold)
            .field("iou_threshold", &self.iou_threshold)
            .finish_non_exhaustive()
    }
}

impl YoloOnnxModel {
    /// Load a YOLOv8 ONNX export
    ///
    /// Class names come from the model's `names` metadata, else from
    /// `labels_path`, else they stay unknown.
    pub fn load(model_path: &Path, labels_path: Option<&Path>) -> Result<Self> {
        if !model_path.exists() {
            anyhow::bail!("Detection model not found: {}", model_path.display());
        }

        info!("Loading detection model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("Failed to load detection model from {}", model_path.display())
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        let metadata_names = session
            .metadata()
            .ok()
            .and_then(|meta| meta.custom("names").ok().flatten())
            .and_then(|raw| parse_names_metadata(&raw));

        let names = match (metadata_names, labels_path) {
            (Some(names), _) => {
                debug!("Using {} class names from model metadata", names.len());
                Some(names)
            }
            (None, Some(path)) => Some(load_labels_file(path)?),
            (None, None) => {
                warn!("Model carries no class names; labels will be numeric ids");
                None
            }
        };

        let name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yolov8".to_string());

        info!(
            "✅ Detection model {} loaded ({} classes, CPU)",
            name,
            names.as_ref().map(|n| n.len()).unwrap_or(0)
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            names: names.map(Arc::new),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            font: None,
            name,
        })
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Font for label text in the native plot
    pub fn with_font(mut self, font: Option<FontArc>) -> Self {
        self.font = font;
        self
    }

    fn label_for(&self, class_id: usize) -> String {
        self.names
            .as_ref()
            .and_then(|n| n.get(&class_id).cloned())
            .unwrap_or_else(|| class_id.to_string())
    }
}

fn run_session(
    session: &Mutex<Session>,
    input_name: &str,
    tensor: ndarray::Array4<f32>,
) -> Result<Array2<f32>, ModelError> {
    let mut session = session
        .lock()
        .map_err(|_| ModelError::Inference("session lock poisoned".into()))?;

    let input_value = Value::from_array(tensor)
        .map_err(|e| ModelError::Inference(format!("failed to create input tensor: {e}")))?;

    let outputs = session
        .run(ort::inputs![input_name => input_value])
        .map_err(|e| ModelError::Inference(e.to_string()))?;

    let output = outputs[0]
        .try_extract_array::<f32>()
        .map_err(|e| ModelError::Inference(format!("failed to extract output: {e}")))?;

    let shape = output.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 {
        return Err(ModelError::Inference(format!(
            "unexpected output shape {:?}, expected [1, 4+nc, N]",
            shape
        )));
    }

    let proposals = output
        .index_axis(Axis(0), 0)
        .to_owned()
        .into_dimensionality::<Ix2>()
        .map_err(|e| ModelError::Inference(e.to_string()))?;
    Ok(proposals)
}

#[async_trait]
impl DetectionModel for YoloOnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_names(&self) -> Option<Arc<ClassNames>> {
        self.names.clone()
    }

    async fn infer(
        &self,
        frame: &RgbImage,
        options: InferenceOptions,
    ) -> Result<RawDetections, ModelError> {
        let (tensor, letterbox) = preprocess_for_yolo(frame);
        let session = Arc::clone(&self.session);
        let input_name = self.input_name.clone();

        let output = tokio::task::spawn_blocking(move || run_session(&session, &input_name, tensor))
            .await
            .map_err(|e| ModelError::Inference(format!("inference task failed: {e}")))??;

        let threshold = options.confidence.unwrap_or(self.confidence_threshold);
        let predictions = decode_predictions(
            output.view(),
            &letterbox,
            threshold,
            self.iou_threshold,
            MAX_DETECTIONS,
        );
        debug!(
            "{} proposals -> {} detections (conf {:.2})",
            output.ncols(),
            predictions.len(),
            threshold
        );

        Ok(RawDetections::new(
            predictions
                .iter()
                .map(|p| RawBox::wrapped(p.xyxy, p.class_id, p.confidence))
                .collect(),
            self.names.clone(),
        ))
    }

    fn plot(&self, frame: &RgbImage, raw: &RawDetections) -> Result<RgbImage, ModelError> {
        let mut canvas = frame.clone();
        for b in &raw.boxes {
            let [x1, y1, x2, y2] = b
                .xyxy
                .as_ref()
                .and_then(|t| t.as_quad())
                .ok_or_else(|| ModelError::PlotFailed("box without coordinates".into()))?;
            let class_id = b
                .cls
                .as_ref()
                .and_then(|t| t.as_scalar())
                .filter(|v| *v >= 0.0)
                .map(|v| v as usize)
                .unwrap_or(0);
            let confidence = b.conf.as_ref().and_then(|t| t.as_scalar()).unwrap_or(0.0);
            let color = class_color(class_id);

            let (x, y) = (x1 as i32, y1 as i32);
            let (w, h) = ((x2 - x1) as i32, (y2 - y1) as i32);
            for inset in 0..2 {
                if w - 2 * inset <= 0 || h - 2 * inset <= 0 {
                    break;
                }
                draw_hollow_rect_mut(
                    &mut canvas,
                    Rect::at(x + inset, y + inset)
                        .of_size((w - 2 * inset) as u32, (h - 2 * inset) as u32),
                    color,
                );
            }

            let text = format!("{} {:.2}", self.label_for(class_id), confidence);
            let tag_w = (text.len() as u32 * 8).max(8);
            let tag_y = (y - 18).max(0);
            draw_filled_rect_mut(&mut canvas, Rect::at(x, tag_y).of_size(tag_w, 18), color);
            if let Some(font) = &self.font {
                draw_text_mut(
                    &mut canvas,
                    Rgb([255, 255, 255]),
                    x + 2,
                    tag_y + 1,
                    PxScale::from(16.0),
                    font,
                    &text,
                );
            }
        }
        Ok(canvas)
    }
}
