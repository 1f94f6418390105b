// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Still-image detection endpoint
//!
//! Provides POST /api/detect for detecting objects in an uploaded image.

pub mod handler;
pub mod response;

pub use handler::detect_handler;
pub use response::DetectResponse;
