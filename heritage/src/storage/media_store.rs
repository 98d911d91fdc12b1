//! Memory media storage
//!
//! Uploads recorded audio and picked photos to their buckets and resolves
//! the public URL of each stored object.
//!
//! Object names are time based so repeated uploads never collide:
//! audio is stored as "<millis>-audio.wav", photos as
//! "<millis>-<original filename>".

use crate::backend::Backend;
use crate::config::{AUDIO_BUCKET, MAX_OBJECT_NAME_LENGTH, PHOTO_BUCKET};
use crate::error::{AppError, Result};
use chrono::Utc;
use std::sync::Arc;

/// Longest suffix, dot included, treated as a file extension
const MAX_EXTENSION_LENGTH: usize = 16;

/// Bucket a memory's media lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Photo,
}

impl MediaKind {
    pub fn bucket(&self) -> &'static str {
        match self {
            MediaKind::Audio => AUDIO_BUCKET,
            MediaKind::Photo => PHOTO_BUCKET,
        }
    }
}

/// Uploads media and hands back public URLs
#[derive(Clone)]
pub struct MediaStore {
    backend: Arc<dyn Backend>,
}

impl MediaStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Upload `data` under `name` and return its public URL
    pub async fn upload(
        &self,
        kind: MediaKind,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
        access_token: &str,
    ) -> Result<String> {
        let bucket = kind.bucket();
        tracing::info!(
            "Uploading {} to {} (size: {} bytes)",
            name,
            bucket,
            data.len()
        );

        let path = self
            .backend
            .upload(bucket, name, data, content_type, access_token)
            .await
            .map_err(|e| match e {
                AppError::Upload(_) => e,
                other => AppError::Upload(other.to_string()),
            })?;

        let url = self.backend.public_url(bucket, &path);
        tracing::debug!("Stored {} at {}", path, url);

        Ok(url)
    }
}

/// Object name for a recording made at `millis`
pub fn audio_object_name(millis: i64) -> String {
    format!("{}-audio.wav", millis)
}

/// Object name for a photo picked from `original` at `millis`
///
/// Over-long names lose characters from the stem; the extension is kept.
pub fn photo_object_name(millis: i64, original: &str) -> String {
    let name = format!("{}-{}", millis, sanitize_filename(original));
    if name.chars().count() <= MAX_OBJECT_NAME_LENGTH {
        return name;
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if name.len() - dot <= MAX_EXTENSION_LENGTH => name.split_at(dot),
        _ => (name.as_str(), ""),
    };
    let keep = MAX_OBJECT_NAME_LENGTH - extension.chars().count();
    stem.chars().take(keep).chain(extension.chars()).collect()
}

/// Milliseconds since the epoch, the unique part of object names
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Sanitize filename to prevent path traversal in object names
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0')
        .collect();

    if cleaned.trim().is_empty() {
        "photo".to_string()
    } else {
        cleaned
    }
}
