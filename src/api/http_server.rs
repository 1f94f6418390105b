// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::{path::Path, sync::Arc};
use tokio::sync::oneshot;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use super::detect::detect_handler;
use super::realtime::{realtime_detect_handler, realtime_frame_handler, realtime_status_handler};
use super::video::{
    process_video_handler, processed_videos_handler, stream_detect_handler,
    upload_video_handler, video_caption_handler, video_stream_handler,
};
use crate::config::NodeConfig;
use crate::storage::UploadStore;
use crate::video::CaptionStore;
use crate::vision::DetectorService;

/// Room for multipart framing on top of the upload limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<DetectorService>,
    pub uploads: Arc<UploadStore>,
    pub captions: Arc<CaptionStore>,
    pub config: Arc<NodeConfig>,
}

impl AppState {
    pub fn new(detector: Arc<DetectorService>, config: NodeConfig) -> Self {
        let uploads = UploadStore::new(config.upload_dir.clone(), config.max_upload_bytes);
        let captions = CaptionStore::new(config.caption_ttl, config.caption_max_entries);
        Self {
            detector,
            uploads: Arc::new(uploads),
            captions: Arc::new(captions),
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub version: String,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model: state.detector.model_name().to_string(),
        version: crate::version::VERSION.to_string(),
    })
}

pub fn create_app(state: Arc<AppState>) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    if !state.config.processed_dir.starts_with(&state.config.static_dir) {
        warn!(
            "⚠️ Processed dir {} is outside static dir {}; processed video URLs will not resolve",
            state.config.processed_dir.display(),
            state.config.static_dir.display()
        );
    }

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/detect", post(detect_handler))
        .route("/api/upload-video", post(upload_video_handler))
        .route("/api/video-stream", get(video_stream_handler))
        .route("/api/video-caption", get(video_caption_handler))
        .route("/api/process-video", post(process_video_handler))
        .route("/api/processed-videos", get(processed_videos_handler))
        .route("/api/stream-detect", get(stream_detect_handler))
        .route("/api/realtime-detect", post(realtime_detect_handler))
        .route("/api/realtime-frame", post(realtime_frame_handler))
        .route("/api/realtime-status", get(realtime_status_handler))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", path.display(), e))
}

/// Serve until `shutdown` fires
pub async fn start_server(
    state: Arc<AppState>,
    shutdown: oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    ensure_dir(&state.config.static_dir).await?;
    ensure_dir(&state.config.upload_dir).await?;
    ensure_dir(&state.config.processed_dir).await?;

    let addr = state.config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", listener.local_addr()?);

    let app = create_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.await;
        })
        .await?;

    info!("API server stopped");
    Ok(())
}
