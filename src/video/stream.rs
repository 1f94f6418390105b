// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-frame detection feeding a streamed response
//!
//! A background task pulls frames from a `FrameProducer`, runs the pipeline,
//! and hands annotated JPEG frames to the response through a channel of
//! capacity one, so at most one processed frame waits for the client. The
//! task stops when the source ends, a frame fails, or the client goes away;
//! in every case the decoder is killed, the caption entry is marked complete
//! and any held upload is deleted.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::caption_store::CaptionStore;
use super::source::FrameProducer;
use crate::storage::UploadGuard;
use crate::vision::detection::RunningCaption;
use crate::vision::image_utils::encode_jpeg;
use crate::vision::{DetectionPipeline, LabelAnchor};

/// Frames buffered ahead of the client
const STREAM_LOOKAHEAD: usize = 1;

#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub threshold: f32,
    pub anchor: LabelAnchor,
}

impl StreamSettings {
    pub fn for_pipeline(pipeline: &DetectionPipeline) -> Self {
        Self {
            threshold: pipeline.default_threshold(),
            anchor: LabelAnchor::Above,
        }
    }
}

/// Where the running caption of a streamed upload is published
#[derive(Clone)]
pub struct CaptionSink {
    pub store: Arc<CaptionStore>,
    pub key: String,
}

/// Start detecting on `source`; the receiver yields encoded JPEG frames
pub fn spawn_detection_stream<S>(
    pipeline: DetectionPipeline,
    mut source: S,
    settings: StreamSettings,
    caption: Option<CaptionSink>,
    upload: Option<UploadGuard>,
) -> mpsc::Receiver<Bytes>
where
    S: FrameProducer + 'static,
{
    let (tx, rx) = mpsc::channel::<Bytes>(STREAM_LOOKAHEAD);

    tokio::spawn(async move {
        let _upload = upload;
        let mut running = RunningCaption::new();
        let mut sent = 0u64;

        loop {
            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("Frame decode failed: {}", e);
                    break;
                }
            };

            let (raw, boxes) = match pipeline.detect_raw(&frame, settings.threshold).await {
                Ok(result) => result,
                Err(e) => {
                    error!("Detection failed mid-stream: {}", e);
                    break;
                }
            };

            if let Some(sink) = &caption {
                running.observe(&boxes);
                if let Some(text) = running.published() {
                    sink.store.publish(&sink.key, text, running.labels()).await;
                }
            }

            let annotated = pipeline.annotate(&frame, &raw, &boxes, settings.anchor);
            let jpeg = match encode_jpeg(&annotated) {
                Ok(jpeg) => jpeg,
                Err(e) => {
                    error!("JPEG encoding failed: {}", e);
                    break;
                }
            };

            if tx.send(Bytes::from(jpeg)).await.is_err() {
                debug!("Stream client went away");
                break;
            }
            sent += 1;
        }

        info!("Stream ended after {} frames", sent);
        if let Some(sink) = &caption {
            sink.store.complete(&sink.key).await;
        }
    });

    rx
}
