// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Intermediate container writer fed with raw RGB frames over stdin

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ChildStdin;

use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::FfmpegEvent;
use image::{imageops, RgbImage};
use tracing::{debug, warn};

use super::VideoError;

/// Encoders tried in order for the intermediate file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntermediateCodec {
    /// MPEG-4 Part 2 tagged XVID
    Xvid,
    Mjpeg,
}

impl IntermediateCodec {
    pub const FALLBACK_ORDER: [IntermediateCodec; 2] =
        [IntermediateCodec::Xvid, IntermediateCodec::Mjpeg];

    fn args(self) -> &'static [&'static str] {
        match self {
            IntermediateCodec::Xvid => &["-c:v", "mpeg4", "-vtag", "XVID", "-q:v", "3"],
            IntermediateCodec::Mjpeg => &["-c:v", "mjpeg", "-q:v", "3"],
        }
    }
}

/// Bring a frame to the writer's size if it differs
pub fn fit_frame(frame: RgbImage, width: u32, height: u32) -> RgbImage {
    if frame.dimensions() == (width, height) {
        frame
    } else {
        imageops::resize(&frame, width, height, imageops::FilterType::Triangle)
    }
}

struct Encoder {
    child: FfmpegChild,
    stdin: Option<ChildStdin>,
}

fn spawn_encoder(
    ffmpeg: &Path,
    output: &Path,
    width: u32,
    height: u32,
    fps: f64,
    codec: IntermediateCodec,
) -> Result<Encoder, VideoError> {
    let size = format!("{}x{}", width, height);
    let rate = format!("{:.3}", fps);
    let mut cmd = FfmpegCommand::new_with_path(ffmpeg);
    cmd.hide_banner()
        .overwrite()
        .format("rawvideo")
        .pix_fmt("rgb24")
        .args(["-s", size.as_str()])
        .args(["-r", rate.as_str()])
        .input("-")
        .args(codec.args())
        .output(output.to_string_lossy().as_ref());

    let mut child = cmd
        .spawn()
        .map_err(|e| VideoError::Spawn(format!("{:?} encoder: {}", codec, e)))?;
    let stdin = child.take_stdin();

    // stderr must be drained or ffmpeg stalls once the pipe fills
    match child.iter() {
        Ok(events) => {
            std::thread::spawn(move || {
                for event in events {
                    if let FfmpegEvent::Error(line) = event {
                        warn!("intermediate encoder: {}", line);
                    }
                }
            });
        }
        Err(e) => warn!("Cannot read intermediate encoder output: {}", e),
    }

    Ok(Encoder { child, stdin })
}

/// ffmpeg process writing `temp_<ts>.avi` from rgb24 frames on stdin
pub struct IntermediateWriter {
    ffmpeg: PathBuf,
    path: PathBuf,
    width: u32,
    height: u32,
    fps: f64,
    /// Index of the active codec in `FALLBACK_ORDER`
    codec_index: usize,
    encoder: Encoder,
    frames_written: u64,
}

impl IntermediateWriter {
    pub fn create(
        ffmpeg: &Path,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Self, VideoError> {
        if width == 0 || height == 0 {
            return Err(VideoError::Encode("writer needs non-zero dimensions".into()));
        }
        let mut last_error = VideoError::Encode("no intermediate codec available".into());
        for (codec_index, codec) in IntermediateCodec::FALLBACK_ORDER.iter().enumerate() {
            match spawn_encoder(ffmpeg, path, width, height, fps, *codec) {
                Ok(encoder) => {
                    debug!("Intermediate writer {} using {:?}", path.display(), codec);
                    return Ok(Self {
                        ffmpeg: ffmpeg.to_path_buf(),
                        path: path.to_path_buf(),
                        width,
                        height,
                        fps,
                        codec_index,
                        encoder,
                        frames_written: 0,
                    });
                }
                Err(e) => {
                    warn!("{:?} intermediate encoder unavailable: {}", codec, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn codec(&self) -> IntermediateCodec {
        IntermediateCodec::FALLBACK_ORDER[self.codec_index]
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Replace a dead encoder with the next codec; only before any frame landed
    fn fall_back(&mut self) -> Result<(), VideoError> {
        let Some(codec) = IntermediateCodec::FALLBACK_ORDER
            .get(self.codec_index + 1)
            .copied()
        else {
            return Err(VideoError::Encode(format!(
                "no intermediate codec could encode {}",
                self.path.display()
            )));
        };
        warn!(
            "{:?} encoder rejected the stream, retrying with {:?}",
            self.codec(),
            codec
        );
        let _ = self.encoder.child.kill();
        let _ = self.encoder.child.wait();
        self.encoder = spawn_encoder(
            &self.ffmpeg,
            &self.path,
            self.width,
            self.height,
            self.fps,
            codec,
        )?;
        self.codec_index += 1;
        Ok(())
    }

    /// Append one frame, resizing it to the writer's size first
    pub async fn write_frame(&mut self, frame: RgbImage) -> Result<(), VideoError> {
        let mut frame = fit_frame(frame, self.width, self.height);
        loop {
            let stdin = self
                .encoder
                .stdin
                .take()
                .ok_or_else(|| VideoError::Encode("encoder stdin closed".into()))?;
            let (stdin, returned, result) = tokio::task::spawn_blocking(move || {
                let mut stdin = stdin;
                let result = stdin.write_all(frame.as_raw());
                (stdin, frame, result)
            })
            .await
            .map_err(|e| VideoError::Encode(format!("writer task failed: {}", e)))?;
            self.encoder.stdin = Some(stdin);
            frame = returned;

            match result {
                Ok(()) => {
                    self.frames_written += 1;
                    return Ok(());
                }
                Err(e) if self.frames_written == 0 => {
                    debug!("First frame write failed: {}", e);
                    self.fall_back()?;
                }
                Err(e) => return Err(VideoError::Io(e)),
            }
        }
    }

    /// Stop the encoder and delete the partial file
    pub fn abort(mut self) {
        drop(self.encoder.stdin.take());
        let _ = self.encoder.child.kill();
        let _ = self.encoder.child.wait();
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("No partial file to remove at {}: {}", self.path.display(), e);
        }
    }

    /// Close stdin and wait for the encoder to flush the container
    pub async fn finish(mut self) -> Result<PathBuf, VideoError> {
        drop(self.encoder.stdin.take());
        let mut child = self.encoder.child;
        let status = tokio::task::spawn_blocking(move || child.wait())
            .await
            .map_err(|e| VideoError::Encode(format!("writer task failed: {}", e)))??;
        if !status.success() {
            return Err(VideoError::Encode(format!(
                "intermediate encoder exited with {}",
                status
            )));
        }
        debug!(
            "Wrote {} frames to {}",
            self.frames_written,
            self.path.display()
        );
        Ok(self.path)
    }
}
