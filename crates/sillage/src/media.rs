//! Media uploads: files on disk, metadata in memory.
//!
//! Files land flat in the upload directory under the basename the client
//! sent. A second upload with the same basename replaces the first file; both
//! metadata records are kept.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Public prefix uploaded files are served under.
pub const UPLOADS_PREFIX: &str = "/uploads";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Metadata for one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaRecord {
    pub id: u64,
    pub title: String,
    pub description: String,
    #[serde(rename = "trackId")]
    pub track_id: String,
    pub lat: f64,
    pub lng: f64,
    pub url: String,
    /// Content type as reported by the client, unchecked.
    #[serde(rename = "type")]
    pub content_type: Option<String>,
}

/// A validated upload waiting to be persisted.
#[derive(Debug, Clone, Default)]
pub struct NewMedia {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub title: String,
    pub description: String,
    pub track_id: String,
    pub lat: f64,
    pub lng: f64,
    pub content_type: Option<String>,
}

/// Append-only media metadata plus the directory the files live in.
#[derive(Debug)]
pub struct MediaStore {
    upload_dir: PathBuf,
    records: RwLock<Vec<MediaRecord>>,
}

impl MediaStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Create the upload directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), MediaError> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|source| MediaError::Io {
                path: self.upload_dir.clone(),
                source,
            })
    }

    /// Write the file, then record it under the next sequential id.
    ///
    /// Nothing is recorded if the write fails.
    pub async fn create(&self, media: NewMedia) -> Result<MediaRecord, MediaError> {
        let filename = sanitize_filename(&media.filename)
            .ok_or_else(|| MediaError::InvalidFilename(media.filename.clone()))?;

        let path = self.upload_dir.join(filename);
        tokio::fs::write(&path, &media.bytes)
            .await
            .map_err(|source| MediaError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), bytes = media.bytes.len(), "media file written");

        let mut records = self.records.write().await;
        let record = MediaRecord {
            id: records.len() as u64 + 1,
            title: media.title,
            description: media.description,
            track_id: media.track_id,
            lat: media.lat,
            lng: media.lng,
            url: format!("{}/{}", UPLOADS_PREFIX, filename),
            content_type: media.content_type,
        };
        records.push(record.clone());
        info!(id = record.id, url = %record.url, "media created");

        Ok(record)
    }

    /// Every record, in upload order.
    pub async fn list(&self) -> Vec<MediaRecord> {
        self.records.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

/// Last path component of a client-supplied filename.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable
/// is left (empty, `.` or `..`).
pub fn sanitize_filename(raw: &str) -> Option<&str> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    match base {
        "" | "." | ".." => None,
        name => Some(name),
    }
}
