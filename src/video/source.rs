// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decoded RGB frames from a video file or capture device

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::OutputVideoFrame;
use image::RgbImage;
use tracing::{debug, warn};

use super::VideoError;

type FrameIter = Box<dyn Iterator<Item = OutputVideoFrame> + Send>;

/// Anything that yields decoded frames in order
#[async_trait]
pub trait FrameProducer: Send {
    /// Next frame, `None` once exhausted
    async fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError>;
}

/// Where frames come from
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    File(PathBuf),
    /// Capture device with its ffmpeg input format (e.g. `v4l2`, `avfoundation`)
    Device { input: String, format: String },
}

/// ffmpeg decoder producing rgb24 frames; the process is killed on drop
pub struct FrameSource {
    child: FfmpegChild,
    frames: Option<FrameIter>,
    description: String,
    frames_read: u64,
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("description", &self.description)
            .field("frames_read", &self.frames_read)
            .finish_non_exhaustive()
    }
}

fn frame_to_image(width: u32, height: u32, data: Vec<u8>) -> Option<RgbImage> {
    RgbImage::from_raw(width, height, data)
}

impl FrameSource {
    pub fn open(ffmpeg: &Path, kind: &SourceKind) -> Result<Self, VideoError> {
        let mut cmd = FfmpegCommand::new_with_path(ffmpeg);
        cmd.hide_banner();
        let description = match kind {
            SourceKind::File(path) => {
                if !path.exists() {
                    return Err(VideoError::NotFound(path.display().to_string()));
                }
                cmd.input(path.to_string_lossy().as_ref());
                path.display().to_string()
            }
            SourceKind::Device { input, format } => {
                cmd.format(format).input(input);
                format!("{} ({})", input, format)
            }
        };
        cmd.format("rawvideo").pix_fmt("rgb24").output("-");

        let mut child = cmd
            .spawn()
            .map_err(|e| VideoError::Spawn(format!("decoder for {}: {}", description, e)))?;
        let iter = child
            .iter()
            .map_err(|e| VideoError::Spawn(format!("decoder output for {}: {}", description, e)))?;

        debug!("Opened frame source {}", description);

        Ok(Self {
            child,
            frames: Some(Box::new(iter.filter_frames())),
            description,
            frames_read: 0,
        })
    }

    pub fn open_file(ffmpeg: &Path, path: &Path) -> Result<Self, VideoError> {
        Self::open(ffmpeg, &SourceKind::File(path.to_path_buf()))
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

#[async_trait]
impl FrameProducer for FrameSource {
    /// Next decoded frame, `None` once the source is exhausted.
    ///
    /// Decoding blocks, so the read runs on the blocking pool.
    async fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        let Some(mut frames) = self.frames.take() else {
            return Ok(None);
        };

        let (frames, next) = tokio::task::spawn_blocking(move || {
            let next = frames.next();
            (frames, next)
        })
        .await
        .map_err(|e| VideoError::Decode(format!("decoder task failed: {}", e)))?;

        match next {
            Some(frame) => {
                self.frames = Some(frames);
                let (w, h) = (frame.width, frame.height);
                let image = frame_to_image(w, h, frame.data).ok_or_else(|| {
                    VideoError::Decode(format!("short frame buffer for {}x{}", w, h))
                })?;
                self.frames_read += 1;
                Ok(Some(image))
            }
            None => {
                debug!(
                    "Frame source {} exhausted after {} frames",
                    self.description, self.frames_read
                );
                Ok(None)
            }
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            // already exited
            debug!("Decoder for {} not killed: {}", self.description, e);
        }
        if let Err(e) = self.child.wait() {
            warn!("Failed to reap decoder for {}: {}", self.description, e);
        }
    }
}
