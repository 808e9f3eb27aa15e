//! Image acceptance rules
//!
//! Every image is checked here before a temporary reference is created
//! for it, and again right before its upload.

use crate::error::{StorageError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Default payload ceiling: 10 MiB
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Raster formats accepted by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMediaType {
    /// `image/jpeg`
    Jpeg,
    /// `image/png`
    Png,
    /// `image/webp`
    Webp,
    /// `image/gif`
    Gif,
}

impl ImageMediaType {
    /// Every supported type
    pub const ALL: [Self; 4] = [Self::Jpeg, Self::Png, Self::Webp, Self::Gif];

    /// Canonical MIME type
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Canonical file extension (without dot)
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    /// Parse a declared MIME type, ignoring case and parameters
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Guess from a file extension (without dot)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }
}

impl fmt::Display for ImageMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Size and type limits for accepted images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    /// Maximum payload size in bytes
    pub max_bytes: usize,
    /// Accepted media types
    pub allowed_types: Vec<ImageMediaType>,
}

impl UploadLimits {
    /// With max payload size
    #[inline]
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// With allowed types
    #[inline]
    #[must_use]
    pub fn with_allowed_types(mut self, types: impl IntoIterator<Item = ImageMediaType>) -> Self {
        self.allowed_types = types.into_iter().collect();
        self
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            allowed_types: ImageMediaType::ALL.to_vec(),
        }
    }
}

/// Raw image selected or dropped by the user
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    name: String,
    content_type: String,
    data: Arc<[u8]>,
}

impl ImageFile {
    /// Create from name, declared content type and bytes
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Read a local file, deriving the content type from its extension
    ///
    /// # Errors
    /// `StorageError::Io` if the file cannot be read
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::io_error(path, e))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let content_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageMediaType::from_extension)
            .map_or("", ImageMediaType::mime);
        Ok(Self::new(name, content_type, data))
    }

    /// File name as selected by the user
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared content type (may be empty)
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Payload bytes
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the payload
    #[inline]
    #[must_use]
    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    /// Payload size in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn extension(&self) -> Option<&str> {
        Path::new(&self.name).extension().and_then(|e| e.to_str())
    }
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Check an image against `limits`
///
/// Size is checked first, then type. An empty declared type falls back to
/// the file-name extension.
///
/// # Errors
/// - `ValidationError::PayloadTooLarge` above `limits.max_bytes`
/// - `ValidationError::UnsupportedMediaType` outside `limits.allowed_types`
pub fn validate_image(file: &ImageFile, limits: &UploadLimits) -> Result<ImageMediaType, ValidationError> {
    if file.len() > limits.max_bytes {
        return Err(ValidationError::payload_too_large(
            file.name(),
            file.len(),
            limits.max_bytes,
        ));
    }

    let declared = file.content_type().trim();
    let media_type = if declared.is_empty() {
        file.extension().and_then(ImageMediaType::from_extension)
    } else {
        ImageMediaType::from_mime(declared)
    };

    match media_type {
        Some(media_type) if limits.allowed_types.contains(&media_type) => Ok(media_type),
        _ => Err(ValidationError::unsupported_media_type(
            file.name(),
            if declared.is_empty() {
                file.extension().unwrap_or("unknown")
            } else {
                declared
            },
        )),
    }
}
