// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Batch re-encoding of an uploaded video with detection overlays

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::encoder::{finalize_output, FinalizeOutcome};
use super::probe::{probe_video, VideoInfo};
use super::source::{FrameProducer, FrameSource};
use super::writer::IntermediateWriter;
use super::VideoError;
use crate::vision::{DetectionPipeline, LabelAnchor};

/// URL prefix processed videos are served under
pub const PROCESSED_URL_PREFIX: &str = "/static/processed";

/// Outcome of one `process_video` run
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    pub frames_processed: u64,
    /// Frame count reported by the container, 0 when unknown
    pub total_frames: u64,
    pub file_name: String,
    #[serde(skip)]
    pub output: PathBuf,
    #[serde(skip)]
    pub outcome: FinalizeOutcome,
}

impl ProcessSummary {
    pub fn url(&self) -> String {
        processed_url(&self.file_name)
    }
}

pub fn processed_url(file_name: &str) -> String {
    format!("{}/{}", PROCESSED_URL_PREFIX, file_name)
}

async fn annotate_frames(
    pipeline: &DetectionPipeline,
    source: &mut FrameSource,
    writer: &mut IntermediateWriter,
) -> Result<u64, VideoError> {
    let threshold = pipeline.default_threshold();
    let mut processed = 0u64;
    while let Some(frame) = source.next_frame().await? {
        let (raw, boxes) = pipeline.detect_raw(&frame, threshold).await?;
        let annotated = pipeline.annotate(&frame, &raw, &boxes, LabelAnchor::Above);
        writer.write_frame(annotated).await?;
        processed += 1;
        if processed % 100 == 0 {
            debug!("Processed {} frames", processed);
        }
    }
    Ok(processed)
}

/// Annotate every frame of `input` and write `processed_<ts>.mp4` into
/// `processed_dir`.
///
/// Runs until the source is exhausted; a failed frame aborts the whole run
/// and removes the partial intermediate file.
pub async fn process_video(
    pipeline: &DetectionPipeline,
    ffmpeg: &Path,
    ffprobe: &Path,
    input: &Path,
    processed_dir: &Path,
    timestamp: i64,
) -> Result<ProcessSummary, VideoError> {
    let ffprobe = ffprobe.to_path_buf();
    let probe_path = input.to_path_buf();
    let info: VideoInfo = tokio::task::spawn_blocking(move || probe_video(&ffprobe, &probe_path))
        .await
        .map_err(|e| VideoError::Probe(format!("probe task failed: {}", e)))??;

    tokio::fs::create_dir_all(processed_dir).await?;
    let file_name = format!("processed_{}.mp4", timestamp);
    let temp_path = processed_dir.join(format!("temp_{}.avi", timestamp));
    let final_path = processed_dir.join(&file_name);

    info!(
        "🎬 Processing {} ({}x{} @ {:.2} fps, {} frames)",
        input.display(),
        info.width,
        info.height,
        info.fps,
        info.frame_count
    );

    let mut source = FrameSource::open_file(ffmpeg, input)?;
    let mut writer =
        IntermediateWriter::create(ffmpeg, &temp_path, info.width, info.height, info.fps)?;

    let frames_processed = match annotate_frames(pipeline, &mut source, &mut writer).await {
        Ok(n) => n,
        Err(e) => {
            warn!("Processing {} failed: {}", input.display(), e);
            writer.abort();
            return Err(e);
        }
    };
    drop(source);

    let temp_path = writer.finish().await?;

    let ffmpeg = ffmpeg.to_path_buf();
    let output = final_path.clone();
    let outcome = tokio::task::spawn_blocking(move || finalize_output(&ffmpeg, &temp_path, &output))
        .await
        .map_err(|e| VideoError::Finalize(format!("finalize task failed: {}", e)))??;

    if outcome == FinalizeOutcome::Renamed {
        warn!("⚠️ {} kept the intermediate encoding", file_name);
    }
    info!(
        "✅ Processed {} frames into {}",
        frames_processed,
        final_path.display()
    );

    Ok(ProcessSummary {
        frames_processed,
        total_frames: info.frame_count,
        file_name,
        output: final_path,
        outcome,
    })
}

/// Names of regular files in the processed directory, newest name first
pub async fn list_processed(processed_dir: &Path) -> Result<Vec<String>, VideoError> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(processed_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort_unstable_by(|a, b| b.cmp(a));
    Ok(names)
}
