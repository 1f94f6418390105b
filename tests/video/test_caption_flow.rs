// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Caption store as seen by pollers of a streamed upload

use std::time::Duration;

use detect_caption_node::vision::detection::RunningCaption;
use detect_caption_node::vision::DetectionBox;
use detect_caption_node::video::{CaptionStatus, CaptionStore};

fn detected(labels: &[&str]) -> Vec<DetectionBox> {
    labels
        .iter()
        .map(|label| DetectionBox {
            x: 0.1,
            y: 0.1,
            w: 0.2,
            h: 0.2,
            label: label.to_string(),
            score: 0.9,
        })
        .collect()
}

#[tokio::test]
async fn test_poller_sees_growing_caption_then_completion() {
    let store = CaptionStore::new(Duration::from_secs(60), 16);
    let key = "upload_1700000000_clip.mp4";
    store.register(key).await;

    let mut running = RunningCaption::new();
    let mut seen = Vec::new();
    for frame in [vec!["car"], vec![], vec!["person", "car"]] {
        running.observe(&detected(&frame));
        if let Some(caption) = running.published() {
            store.publish(key, caption, running.labels()).await;
        }
        seen.push(store.status(key).await);
    }

    assert_eq!(
        seen[0],
        CaptionStatus::Ready {
            caption: "The video contains: car.".to_string(),
            labels: vec!["car".to_string()],
            complete: false,
        }
    );
    assert_eq!(seen[0], seen[1]);
    assert_eq!(
        seen[2],
        CaptionStatus::Ready {
            caption: "The video contains: car, person.".to_string(),
            labels: vec!["car".to_string(), "person".to_string()],
            complete: false,
        }
    );

    store.complete(key).await;
    let json = serde_json::to_value(store.status(key).await).unwrap();
    assert_eq!(json["status"], "ready");
    assert_eq!(json["complete"], true);
    assert_eq!(json["caption"], "The video contains: car, person.");
}

#[tokio::test]
async fn test_video_without_detections_stays_processing() {
    let store = CaptionStore::new(Duration::from_secs(60), 16);
    let key = "upload_1_empty.mp4";
    store.register(key).await;

    let mut running = RunningCaption::new();
    for _ in 0..3 {
        running.observe(&[]);
        assert!(running.published().is_none());
    }
    store.complete(key).await;

    let json = serde_json::to_value(store.status(key).await).unwrap();
    assert_eq!(json["status"], "processing");
    assert_eq!(json["caption"], "");
    assert_eq!(json["complete"], true);
}
