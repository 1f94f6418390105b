// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Running video captions keyed by saved upload name
//!
//! Entries live for `ttl` after the stream completes (or after their last
//! update if it never does). The store holds at most `max_entries`; the
//! oldest entries go first. Expiry is applied on writes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

pub const DEFAULT_CAPTION_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_MAX_CAPTIONS: usize = 1024;

#[derive(Debug, Clone)]
struct CaptionEntry {
    caption: String,
    labels: Vec<String>,
    complete: bool,
    created_at: Instant,
    updated_at: Instant,
}

impl CaptionEntry {
    fn new(now: Instant) -> Self {
        Self {
            caption: String::new(),
            labels: Vec::new(),
            complete: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What a poller sees for one video
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CaptionStatus {
    /// Unknown key, or nothing detected yet
    Processing { caption: String, complete: bool },
    Ready {
        caption: String,
        labels: Vec<String>,
        complete: bool,
    },
}

pub struct CaptionStore {
    entries: RwLock<HashMap<String, CaptionEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for CaptionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTION_TTL, DEFAULT_MAX_CAPTIONS)
    }
}

impl CaptionStore {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn purge(&self, entries: &mut HashMap<String, CaptionEntry>, now: Instant) {
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.updated_at) < self.ttl);

        while entries.len() > self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }

        let removed = before - entries.len();
        if removed > 0 {
            debug!("Purged {} caption entries", removed);
        }
    }

    /// Start tracking a freshly uploaded video with an empty caption
    pub async fn register(&self, key: &str) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), CaptionEntry::new(now));
        self.purge(&mut entries, now);
    }

    /// Store the caption after a frame; callers only publish non-empty label sets
    pub async fn publish(&self, key: &str, caption: String, labels: Vec<String>) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| CaptionEntry::new(now));
        entry.caption = caption;
        entry.labels = labels;
        entry.updated_at = now;
        self.purge(&mut entries, now);
    }

    /// Mark the stream finished; the caption keeps its last value
    pub async fn complete(&self, key: &str) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.complete = true;
            entry.updated_at = now;
        }
        self.purge(&mut entries, now);
    }

    pub async fn status(&self, key: &str) -> CaptionStatus {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.caption.is_empty() => CaptionStatus::Ready {
                caption: entry.caption.clone(),
                labels: entry.labels.clone(),
                complete: entry.complete,
            },
            Some(entry) => CaptionStatus::Processing {
                caption: String::new(),
                complete: entry.complete,
            },
            None => CaptionStatus::Processing {
                caption: String::new(),
                complete: false,
            },
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
