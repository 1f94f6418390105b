// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Final H.264 transcode of the intermediate container

use std::path::Path;

use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::FfmpegEvent;
use tracing::{debug, info, warn};

use super::VideoError;

/// How the final file came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Transcoded to H.264/yuv420p; the intermediate file was removed
    Transcoded,
    /// Transcode failed; the intermediate file was moved into place as is
    Renamed,
}

fn transcode(ffmpeg: &Path, temp: &Path, output: &Path) -> Result<(), String> {
    let mut cmd = FfmpegCommand::new_with_path(ffmpeg);
    cmd.hide_banner()
        .overwrite()
        .input(temp.to_string_lossy().as_ref())
        .args(["-vcodec", "libx264", "-pix_fmt", "yuv420p"])
        .output(output.to_string_lossy().as_ref());

    let mut child = cmd.spawn().map_err(|e| format!("spawn failed: {}", e))?;

    let mut last_error = None;
    let events = child.iter().map_err(|e| e.to_string())?;
    for event in events {
        if let FfmpegEvent::Error(line) = event {
            last_error = Some(line);
        }
    }

    let status = child.wait().map_err(|e| e.to_string())?;
    if status.success() {
        Ok(())
    } else {
        Err(last_error.unwrap_or_else(|| format!("ffmpeg exited with {}", status)))
    }
}

/// Convert `temp` to the final H.264 file.
///
/// On transcode failure the intermediate file becomes the output; if even the
/// rename fails the intermediate file is deleted and an error returned.
pub fn finalize_output(
    ffmpeg: &Path,
    temp: &Path,
    output: &Path,
) -> Result<FinalizeOutcome, VideoError> {
    match transcode(ffmpeg, temp, output) {
        Ok(()) => {
            if let Err(e) = std::fs::remove_file(temp) {
                warn!("Could not remove intermediate {}: {}", temp.display(), e);
            }
            info!("Encoded {}", output.display());
            Ok(FinalizeOutcome::Transcoded)
        }
        Err(reason) => {
            warn!(
                "H.264 transcode of {} failed ({}); keeping intermediate encoding",
                temp.display(),
                reason
            );
            match std::fs::rename(temp, output) {
                Ok(()) => {
                    debug!("Moved {} to {}", temp.display(), output.display());
                    Ok(FinalizeOutcome::Renamed)
                }
                Err(e) => {
                    if temp.exists() {
                        let _ = std::fs::remove_file(temp);
                    }
                    Err(VideoError::Finalize(format!(
                        "Could not convert or move output file: {}",
                        e
                    )))
                }
            }
        }
    }
}
