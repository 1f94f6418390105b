// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration from the environment
//!
//! `.env` is loaded by the binary before [`NodeConfig::from_env`] runs; CLI
//! flags are applied on top afterwards.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::storage::DEFAULT_MAX_UPLOAD_BYTES;
use crate::video::{sibling_ffprobe, DEFAULT_CAPTION_TTL, DEFAULT_MAX_CAPTIONS};
use crate::vision::detection::yolo::DEFAULT_IOU_THRESHOLD;
use crate::vision::detection::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::vision::{DetectorBackend, DetectorConfig};

pub const DEFAULT_API_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub listen_addr: String,
    /// YOLOv8 ONNX export
    pub model_path: PathBuf,
    /// One class name per line; used when the model carries no names
    pub labels_path: Option<PathBuf>,
    /// Remote detector base URL; takes precedence over `model_path`
    pub detector_endpoint: Option<String>,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub upload_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub static_dir: PathBuf,
    pub font_path: Option<PathBuf>,
    pub ffmpeg_path: PathBuf,
    /// Defaults to the ffprobe next to `ffmpeg_path`
    pub ffprobe_path: Option<PathBuf>,
    /// Capture device for `/api/stream-detect`
    pub camera_input: String,
    pub camera_format: String,
    pub caption_ttl: Duration,
    pub caption_max_entries: usize,
    pub max_upload_bytes: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", DEFAULT_API_PORT),
            model_path: PathBuf::from("./models/yolov8n.onnx"),
            labels_path: None,
            detector_endpoint: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            upload_dir: PathBuf::from("static/uploads"),
            processed_dir: PathBuf::from("static/processed"),
            static_dir: PathBuf::from("static"),
            font_path: None,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: None,
            camera_input: "/dev/video0".to_string(),
            camera_format: "v4l2".to_string(),
            caption_ttl: DEFAULT_CAPTION_TTL,
            caption_max_entries: DEFAULT_MAX_CAPTIONS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl NodeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let listen_addr = non_empty("LISTEN_ADDR").unwrap_or_else(|| {
            let port = parsed::<u16>("API_PORT").unwrap_or(DEFAULT_API_PORT);
            format!("0.0.0.0:{}", port)
        });

        let static_dir = non_empty("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.static_dir);

        Self {
            listen_addr,
            model_path: non_empty("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            labels_path: non_empty("LABELS_PATH").map(PathBuf::from),
            detector_endpoint: non_empty("DETECTOR_ENDPOINT"),
            confidence_threshold: parsed("CONFIDENCE_THRESHOLD")
                .unwrap_or(defaults.confidence_threshold),
            iou_threshold: parsed("IOU_THRESHOLD").unwrap_or(defaults.iou_threshold),
            upload_dir: non_empty("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| static_dir.join("uploads")),
            processed_dir: non_empty("PROCESSED_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| static_dir.join("processed")),
            static_dir,
            font_path: non_empty("FONT_PATH").map(PathBuf::from),
            ffmpeg_path: non_empty("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: non_empty("FFPROBE_PATH").map(PathBuf::from),
            camera_input: non_empty("CAMERA_INPUT").unwrap_or(defaults.camera_input),
            camera_format: non_empty("CAMERA_FORMAT").unwrap_or(defaults.camera_format),
            caption_ttl: parsed::<u64>("CAPTION_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.caption_ttl),
            caption_max_entries: parsed("CAPTION_MAX_ENTRIES")
                .unwrap_or(defaults.caption_max_entries),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES").unwrap_or(defaults.max_upload_bytes),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(format!(
                "Confidence threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(format!(
                "IoU threshold must be within [0, 1], got {}",
                self.iou_threshold
            ));
        }
        if self.caption_ttl.is_zero() {
            return Err("Caption TTL must be greater than 0".to_string());
        }
        if self.caption_max_entries == 0 {
            return Err("Caption store must hold at least one entry".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("Upload size limit must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address '{}'", self.listen_addr))
    }

    pub fn ffprobe_binary(&self) -> PathBuf {
        self.ffprobe_path
            .clone()
            .unwrap_or_else(|| sibling_ffprobe(&self.ffmpeg_path))
    }

    pub fn detector_config(&self) -> DetectorConfig {
        let backend = match &self.detector_endpoint {
            Some(endpoint) => DetectorBackend::Remote {
                endpoint: endpoint.clone(),
            },
            None => DetectorBackend::Onnx {
                model_path: self.model_path.clone(),
                labels_path: self.labels_path.clone(),
            },
        };
        DetectorConfig {
            backend,
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            font_path: self.font_path.clone(),
        }
    }
}
