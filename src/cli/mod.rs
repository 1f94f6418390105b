// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;

use crate::api::{start_server, AppState, DetectResponse};
use crate::config::NodeConfig;
use crate::vision::detection::IMAGE_PREFIX;
use crate::vision::DetectorService;

/// Detect Caption Node CLI
#[derive(Parser, Debug)]
#[command(name = "detect-caption-node")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Object detection and captioning over HTTP", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve(ServeArgs),

    /// Detect objects in one image file and print the JSON result
    Detect(DetectArgs),
}

/// Overrides for values otherwise taken from the environment
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Address to listen on (e.g., 0.0.0.0:8080)
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// YOLOv8 ONNX model file
    #[arg(long)]
    pub model_path: Option<PathBuf>,

    /// Class names file, one per line
    #[arg(long)]
    pub labels_path: Option<PathBuf>,

    /// Remote detector base URL (replaces the local model)
    #[arg(long)]
    pub detector_endpoint: Option<String>,

    #[arg(long)]
    pub confidence_threshold: Option<f32>,

    #[arg(long)]
    pub iou_threshold: Option<f32>,

    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    #[arg(long)]
    pub processed_dir: Option<PathBuf>,

    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// TrueType font for box labels
    #[arg(long)]
    pub font_path: Option<PathBuf>,

    #[arg(long)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Defaults to the ffprobe next to the ffmpeg binary
    #[arg(long)]
    pub ffprobe_path: Option<PathBuf>,

    /// Capture device for the camera stream (e.g., /dev/video0)
    #[arg(long)]
    pub camera_input: Option<String>,

    /// ffmpeg input format of the capture device (e.g., v4l2)
    #[arg(long)]
    pub camera_format: Option<String>,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut NodeConfig) {
        if let Some(v) = &self.listen_addr {
            config.listen_addr = v.clone();
        }
        if let Some(v) = &self.model_path {
            config.model_path = v.clone();
        }
        if let Some(v) = &self.labels_path {
            config.labels_path = Some(v.clone());
        }
        if let Some(v) = &self.detector_endpoint {
            config.detector_endpoint = Some(v.clone());
        }
        if let Some(v) = self.confidence_threshold {
            config.confidence_threshold = v;
        }
        if let Some(v) = self.iou_threshold {
            config.iou_threshold = v;
        }
        if let Some(v) = &self.upload_dir {
            config.upload_dir = v.clone();
        }
        if let Some(v) = &self.processed_dir {
            config.processed_dir = v.clone();
        }
        if let Some(v) = &self.static_dir {
            config.static_dir = v.clone();
        }
        if let Some(v) = &self.font_path {
            config.font_path = Some(v.clone());
        }
        if let Some(v) = &self.ffmpeg_path {
            config.ffmpeg_path = v.clone();
        }
        if let Some(v) = &self.ffprobe_path {
            config.ffprobe_path = Some(v.clone());
        }
        if let Some(v) = &self.camera_input {
            config.camera_input = v.clone();
        }
        if let Some(v) = &self.camera_format {
            config.camera_format = v.clone();
        }
    }

    /// Environment config with these overrides applied, validated
    pub fn resolve(&self) -> Result<NodeConfig> {
        let mut config = NodeConfig::from_env();
        self.apply(&mut config);
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Image to run detection on
    pub image: PathBuf,

    /// Write the annotated image here
    #[arg(long)]
    pub annotated: Option<PathBuf>,

    #[command(flatten)]
    pub serve: ServeArgs,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Serve(args)) => serve(args).await,
        Some(Commands::Detect(args)) => detect_file(args).await,
        None => serve(ServeArgs::default()).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = args.resolve()?;

    info!("👁️ Loading detector...");
    let detector = DetectorService::load(&config.detector_config())
        .await
        .context("Failed to load detector")?;
    info!("   Model: {}", detector.model_name());

    let state = Arc::new(AppState::new(Arc::new(detector), config));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("⏹️ Shutting down...");
        }
        let _ = shutdown_tx.send(());
    });

    start_server(state, shutdown_rx).await
}

async fn detect_file(args: DetectArgs) -> Result<()> {
    let config = args.serve.resolve()?;
    let detector = DetectorService::load(&config.detector_config())
        .await
        .context("Failed to load detector")?;

    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("Failed to read {}", args.image.display()))?;

    let pipeline = detector.pipeline();
    let mut options = pipeline.options().with_prefix(IMAGE_PREFIX);
    if args.annotated.is_some() {
        options = options.with_annotation(crate::vision::LabelAnchor::Above);
    }
    let result = pipeline.detect_bytes(&bytes, &options).await?;

    if let (Some(path), Some(frame)) = (&args.annotated, &result.annotated_frame) {
        frame
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Annotated image written to {}", path.display());
    }

    let response: DetectResponse = result.into();
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
