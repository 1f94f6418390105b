// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client for a detector sidecar reachable over HTTP

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbImage;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use super::model::{DetectionModel, InferenceOptions, ModelError, CONFIDENCE_OPTION};
use super::raw::{ClassNames, RawBox, RawDetections};
use crate::vision::image_utils::encode_jpeg;

#[derive(serde::Serialize)]
struct DetectRequest {
    image: String,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conf: Option<f32>,
}

#[derive(serde::Deserialize)]
struct DetectResponse {
    #[serde(default)]
    boxes: Vec<RawBox>,
    /// JSON object keys are strings: `{"0": "person"}`
    #[serde(default)]
    names: Option<HashMap<String, String>>,
}

fn parse_names(names: HashMap<String, String>) -> ClassNames {
    names
        .into_iter()
        .filter_map(|(k, v)| Some((k.trim().parse::<usize>().ok()?, v)))
        .collect()
}

/// Whether an error response is the sidecar refusing the `conf` parameter
fn rejects_confidence(status: StatusCode, body: &str) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
    ) && body.contains(CONFIDENCE_OPTION)
}

/// Detector sidecar speaking `POST /v1/detect`
pub struct RemoteDetector {
    client: Client,
    endpoint: String,
    name: String,
}

impl RemoteDetector {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        let endpoint = endpoint.trim_end_matches('/').to_string();
        info!("Remote detector configured: endpoint={}", endpoint);

        Ok(Self {
            name: format!("remote:{}", endpoint),
            client,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check if the sidecar is healthy
    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Detector health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl DetectionModel for RemoteDetector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn infer(
        &self,
        frame: &RgbImage,
        options: InferenceOptions,
    ) -> Result<RawDetections, ModelError> {
        let jpeg = encode_jpeg(frame).map_err(|e| ModelError::Inference(e.to_string()))?;
        let request = DetectRequest {
            image: STANDARD.encode(&jpeg),
            format: "jpeg",
            conf: options.confidence,
        };

        let response = self
            .client
            .post(format!("{}/v1/detect", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Inference(format!("detector unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if options.confidence.is_some() && rejects_confidence(status, &body) {
                return Err(ModelError::UnsupportedOption(CONFIDENCE_OPTION.to_string()));
            }
            return Err(ModelError::Inference(format!(
                "detector returned {}: {}",
                status, body
            )));
        }

        let parsed: DetectResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Inference(format!("invalid detector response: {e}")))?;

        debug!("Remote detector returned {} boxes", parsed.boxes.len());

        Ok(RawDetections::new(
            parsed.boxes,
            parsed.names.map(|n| Arc::new(parse_names(n))),
        ))
    }
}
