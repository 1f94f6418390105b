// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::Deserialize;

/// `?video_path=<saved name>` as returned by the upload endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoPathQuery {
    #[serde(default)]
    pub video_path: Option<String>,
}

impl VideoPathQuery {
    /// The parameter when present and non-empty
    pub fn path(&self) -> Option<&str> {
        self.video_path.as_deref().filter(|p| !p.is_empty())
    }
}
