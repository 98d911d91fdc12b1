//! Photo picker
//!
//! Holds zero or one picked image. Picking produces a data-URL preview
//! immediately and keeps the raw bytes for upload; picking again or
//! clearing replaces both together.

use crate::error::{AppError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

/// An image chosen from the local device
#[derive(Debug, Clone, PartialEq)]
pub struct PickedPhoto {
    /// Original filename, used in the stored object name
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl PickedPhoto {
    /// Read an image from disk, inferring its type from the extension
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content_type = image_mime_for(path).ok_or_else(|| {
            AppError::Validation(format!("Not a supported image file: {}", path.display()))
        })?;

        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("photo")
            .to_string();

        Ok(Self {
            filename,
            content_type: content_type.to_string(),
            data,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PhotoPicker {
    selected: Option<(PickedPhoto, String)>,
}

impl PhotoPicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick `photo`, replacing any earlier pick
    pub fn select(&mut self, photo: PickedPhoto) -> Result<()> {
        if !photo.content_type.starts_with("image/") {
            return Err(AppError::Validation(format!(
                "{} is not an image ({})",
                photo.filename, photo.content_type
            )));
        }

        let preview = format!(
            "data:{};base64,{}",
            photo.content_type,
            STANDARD.encode(&photo.data)
        );
        tracing::debug!("Picked photo {} ({} bytes)", photo.filename, photo.data.len());
        self.selected = Some((photo, preview));

        Ok(())
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    pub fn photo(&self) -> Option<&PickedPhoto> {
        self.selected.as_ref().map(|(photo, _)| photo)
    }

    /// Data URL for displaying the picked image
    pub fn preview(&self) -> Option<&str> {
        self.selected.as_ref().map(|(_, preview)| preview.as_str())
    }
}

fn image_mime_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(mime)
}
