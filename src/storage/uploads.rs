// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload storage on local disk
//!
//! Uploaded media is saved as `upload_<unix_ts>_<sanitized name>` under the
//! upload directory. Clients refer back to uploads by that saved name.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Default cap on a single upload (500MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 500 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Empty filename")]
    EmptyFilename,

    #[error("Invalid filename: {0}")]
    InvalidName(String),

    #[error("Upload too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Upload not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Accented letters are folded to their base letter (`é` → `e`), path
/// separators and whitespace become `_`, anything else outside ASCII
/// alphanumerics and `._-` is dropped, and leading/trailing `.`/`_` are
/// stripped. May return an empty string.
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Key a client uses for an upload: the sanitized last path component
pub fn upload_key(client_name: &str) -> String {
    let base = Path::new(client_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    secure_filename(&base)
}

/// A file written to the upload directory
#[derive(Debug, Clone, PartialEq)]
pub struct SavedUpload {
    /// Saved file name, returned to clients as the upload identifier
    pub name: String,
    pub path: PathBuf,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    upload_dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(upload_dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_bytes,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn ensure_dir(&self) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        Ok(())
    }

    /// Saved name for an upload received at `timestamp`
    pub fn saved_name(timestamp: i64, original_name: &str) -> Result<String, UploadError> {
        if original_name.is_empty() {
            return Err(UploadError::EmptyFilename);
        }
        let clean = secure_filename(original_name);
        if clean.is_empty() {
            return Err(UploadError::InvalidName(original_name.to_string()));
        }
        Ok(format!("upload_{}_{}", timestamp, clean))
    }

    /// Write an upload to disk under its saved name
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<SavedUpload, UploadError> {
        if data.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: data.len(),
                max: self.max_bytes,
            });
        }

        let timestamp = chrono::Utc::now().timestamp();
        let name = Self::saved_name(timestamp, original_name)?;
        let path = self.upload_dir.join(&name);

        self.ensure_dir().await?;
        tokio::fs::write(&path, data).await?;

        info!("📥 Saved upload {} ({} bytes)", name, data.len());
        Ok(SavedUpload {
            name,
            path,
            timestamp,
        })
    }

    /// Path of a previously saved upload named by a client
    pub fn resolve(&self, client_name: &str) -> Result<PathBuf, UploadError> {
        let key = upload_key(client_name);
        if key.is_empty() {
            return Err(UploadError::InvalidName(client_name.to_string()));
        }
        let path = self.upload_dir.join(&key);
        if !path.is_file() {
            debug!("Upload {} not found at {}", client_name, path.display());
            return Err(UploadError::NotFound(key));
        }
        Ok(path)
    }
}

/// Owning handle on an uploaded file; the file is deleted when the guard drops
#[derive(Debug)]
pub struct UploadGuard {
    path: PathBuf,
    armed: bool,
}

impl UploadGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file on disk after all
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed upload {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove upload {}: {}", self.path.display(), e),
        }
    }
}
