// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide detector service
//!
//! Loaded once at startup and shared through the HTTP `AppState`. Tests build
//! it from any `DetectionModel` with [`DetectorService::from_model`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::vision::detection::{
    Annotator, DetectionModel, DetectionPipeline, RemoteDetector, YoloOnnxModel,
    DEFAULT_CONFIDENCE_THRESHOLD,
};
use crate::vision::detection::yolo::DEFAULT_IOU_THRESHOLD;

/// Which model backend to load
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorBackend {
    /// Local YOLOv8 ONNX export
    Onnx {
        model_path: PathBuf,
        labels_path: Option<PathBuf>,
    },
    /// Detector sidecar over HTTP
    Remote { endpoint: String },
}

/// Configuration for loading the detector
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub backend: DetectorBackend,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// TrueType font for label text (optional)
    pub font_path: Option<PathBuf>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: DetectorBackend::Onnx {
                model_path: PathBuf::from("./models/yolov8n.onnx"),
                labels_path: None,
            },
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            font_path: None,
        }
    }
}

/// Information about the loaded detector
#[derive(Debug, Clone, Serialize)]
pub struct DetectorInfo {
    pub name: String,
    pub backend: String,
    pub classes: usize,
    pub confidence_threshold: f32,
}

/// Owner of the loaded model and the pipeline built around it
pub struct DetectorService {
    pipeline: DetectionPipeline,
    backend: String,
}

impl DetectorService {
    /// Load the configured backend
    pub async fn load(config: &DetectorConfig) -> Result<Self> {
        let annotator = Annotator::load(config.font_path.as_deref());
        let font = annotator.font().cloned();

        let (model, backend): (Arc<dyn DetectionModel>, &str) = match &config.backend {
            DetectorBackend::Onnx {
                model_path,
                labels_path,
            } => {
                let model_path = model_path.clone();
                let labels_path = labels_path.clone();
                // session construction is blocking
                let model = tokio::task::spawn_blocking(move || {
                    YoloOnnxModel::load(&model_path, labels_path.as_deref())
                })
                .await
                .context("Model loading task panicked")??
                .with_confidence_threshold(config.confidence_threshold)
                .with_iou_threshold(config.iou_threshold)
                .with_font(font);
                (Arc::new(model), "onnx")
            }
            DetectorBackend::Remote { endpoint } => {
                let detector = RemoteDetector::new(endpoint)
                    .with_context(|| format!("Failed to configure remote detector {}", endpoint))?;
                if !detector.health_check().await {
                    tracing::warn!("⚠️ Remote detector {} is not answering health checks", endpoint);
                }
                (Arc::new(detector), "remote")
            }
        };

        info!("✅ Detector ready: {} ({})", model.name(), backend);

        let pipeline = DetectionPipeline::new(model, Arc::new(annotator))
            .with_default_threshold(config.confidence_threshold);
        Ok(Self {
            pipeline,
            backend: backend.to_string(),
        })
    }

    /// Wrap an already constructed model
    pub fn from_model(model: Arc<dyn DetectionModel>) -> Self {
        Self {
            pipeline: DetectionPipeline::new(model, Arc::new(Annotator::bundled())),
            backend: "custom".to_string(),
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        let threshold = self.pipeline.default_threshold();
        self.pipeline = DetectionPipeline::new(self.pipeline.model().clone(), Arc::new(annotator))
            .with_default_threshold(threshold);
        self
    }

    pub fn pipeline(&self) -> &DetectionPipeline {
        &self.pipeline
    }

    pub fn model_name(&self) -> &str {
        self.pipeline.model().name()
    }

    pub fn info(&self) -> DetectorInfo {
        DetectorInfo {
            name: self.model_name().to_string(),
            backend: self.backend.clone(),
            classes: self
                .pipeline
                .model()
                .class_names()
                .map(|n| n.len())
                .unwrap_or(0),
            confidence_threshold: self.pipeline.default_threshold(),
        }
    }
}
