// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Realtime frame endpoints
//!
//! - POST /api/realtime-detect - boxes and caption for one frame
//! - POST /api/realtime-frame - the same plus an annotated JPEG
//! - GET /api/realtime-status - detector status

pub mod handler;
pub mod response;

pub use handler::{realtime_detect_handler, realtime_frame_handler, realtime_status_handler};
pub use response::{RealtimeDetectResponse, RealtimeFrameResponse, RealtimeStatusResponse};
