// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

pub const MJPEG_BOUNDARY: &str = "frame";
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// One multipart part carrying a JPEG frame
pub fn format_mjpeg_chunk(jpeg: &[u8]) -> Bytes {
    let head = format!(
        "--{}\r\nContent-Type: image/jpeg\r\n\r\n",
        MJPEG_BOUNDARY
    );
    let mut chunk = BytesMut::with_capacity(head.len() + jpeg.len() + 2);
    chunk.put_slice(head.as_bytes());
    chunk.put_slice(jpeg);
    chunk.put_slice(b"\r\n");
    chunk.freeze()
}

/// Multipart body over JPEG frames arriving on a channel
pub struct MjpegStream {
    receiver: mpsc::Receiver<Bytes>,
}

impl MjpegStream {
    pub fn new(receiver: mpsc::Receiver<Bytes>) -> Self {
        Self { receiver }
    }

    pub fn into_response(self) -> Response {
        (
            [(header::CONTENT_TYPE, MJPEG_CONTENT_TYPE)],
            Body::from_stream(self),
        )
            .into_response()
    }
}

impl Stream for MjpegStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(jpeg)) => Poll::Ready(Some(Ok(format_mjpeg_chunk(&jpeg)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
