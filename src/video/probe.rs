// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Container metadata via ffprobe

use std::path::{Path, PathBuf};
use std::process::Command;

use ffprobe::FfProbe;
use serde::Serialize;
use tracing::debug;

use super::VideoError;

/// Frame rate used when the container does not report a usable one
pub const FALLBACK_FPS: f64 = 25.0;

/// Basic properties of the first video stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Reported frame count, 0 when unknown
    pub frame_count: u64,
}

/// Parse a frame rate string (e.g. "30000/1001" or "29.97"); `None` when
/// absent, malformed or not positive.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// The ffprobe binary installed next to `ffmpeg`.
///
/// `/opt/ff/bin/ffmpeg` gives `/opt/ff/bin/ffprobe` and `ffmpeg.exe` gives
/// `ffprobe.exe`; a bare `ffmpeg` stays a PATH lookup.
pub fn sibling_ffprobe(ffmpeg: &Path) -> PathBuf {
    let name = ffmpeg
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| n.contains("ffmpeg"))
        .map(|n| n.replacen("ffmpeg", "ffprobe", 1))
        .unwrap_or_else(|| "ffprobe".to_string());
    match ffmpeg.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
        _ => PathBuf::from(name),
    }
}

/// Run `ffprobe` on `path` and parse its JSON report
fn read_metadata(ffprobe: &Path, path: &Path) -> Result<FfProbe, VideoError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-show_format",
            "-show_streams",
            "-print_format",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| VideoError::Probe(format!("{}: {}", ffprobe.display(), e)))?;

    if !output.status.success() {
        return Err(VideoError::Probe(format!(
            "{} exited with {} for {}",
            ffprobe.display(),
            output.status,
            path.display()
        )));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| VideoError::Probe(format!("{}: unreadable report: {}", path.display(), e)))
}

/// Probe width, height, fps and frame count of a video file with the given
/// ffprobe binary
pub fn probe_video(ffprobe: &Path, path: &Path) -> Result<VideoInfo, VideoError> {
    if !path.exists() {
        return Err(VideoError::NotFound(path.display().to_string()));
    }

    let metadata = read_metadata(ffprobe, path)?;

    let stream = metadata
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| VideoError::Probe(format!("no video stream in {}", path.display())))?;

    let width = stream.width.unwrap_or(0).max(0) as u32;
    let height = stream.height.unwrap_or(0).max(0) as u32;
    if width == 0 || height == 0 {
        return Err(VideoError::Probe(format!(
            "video stream in {} has no dimensions",
            path.display()
        )));
    }

    let fps = parse_frame_rate(&stream.avg_frame_rate)
        .or_else(|| parse_frame_rate(&stream.r_frame_rate))
        .unwrap_or(FALLBACK_FPS);

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);

    debug!(
        "Probed {}: {}x{} @ {:.2} fps, {} frames",
        path.display(),
        width,
        height,
        fps,
        frame_count
    );

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count,
    })
}
