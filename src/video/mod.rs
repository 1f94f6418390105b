// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Video handling around the detection pipeline
//!
//! This module provides:
//! - Container probing (`ffprobe`)
//! - Frame decoding from files and capture devices (`ffmpeg` rawvideo)
//! - Annotated re-encoding with a final H.264 transcode
//! - Streamed per-frame detection for MJPEG responses
//! - The running-caption store polled by clients

pub mod caption_store;
pub mod encoder;
pub mod probe;
pub mod processor;
pub mod source;
pub mod stream;
pub mod writer;

use thiserror::Error;

use crate::vision::PipelineError;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("video not found: {0}")]
    NotFound(String),

    #[error("probe failed: {0}")]
    Probe(String),

    #[error("could not start ffmpeg: {0}")]
    Spawn(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("{0}")]
    Finalize(String),

    #[error(transparent)]
    Detection(#[from] PipelineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub use caption_store::{CaptionStatus, CaptionStore, DEFAULT_CAPTION_TTL, DEFAULT_MAX_CAPTIONS};
pub use encoder::{finalize_output, FinalizeOutcome};
pub use probe::{probe_video, sibling_ffprobe, VideoInfo, FALLBACK_FPS};
pub use processor::{list_processed, process_video, ProcessSummary};
pub use source::{FrameProducer, FrameSource, SourceKind};
pub use stream::{spawn_detection_stream, CaptionSink, StreamSettings};
pub use writer::{IntermediateCodec, IntermediateWriter};
