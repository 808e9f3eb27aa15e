//! Error types for the media pipeline
//!
//! Provides error handling for:
//! - Image acceptance (validation at insertion and upload time)
//! - Object storage calls
//! - Commit-time materialization
//! - Episode persistence and the save flow around it
//! - Configuration loading

use memoir_document::{DocumentError, TemporaryReference};
use std::path::PathBuf;

/// Image rejected before it ever enters the registry or the document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Payload above the size ceiling
    #[error("{name} is too large: {size} bytes (max: {max})")]
    PayloadTooLarge { name: String, size: usize, max: usize },

    /// Media type not on the allow-list
    #[error("{name} has unsupported media type '{media_type}'")]
    UnsupportedMediaType { name: String, media_type: String },
}

impl ValidationError {
    /// Create payload-too-large error
    pub fn payload_too_large(name: impl Into<String>, size: usize, max: usize) -> Self {
        Self::PayloadTooLarge {
            name: name.into(),
            size,
            max,
        }
    }

    /// Create unsupported-media-type error
    pub fn unsupported_media_type(name: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self::UnsupportedMediaType {
            name: name.into(),
            media_type: media_type.into(),
        }
    }
}

/// Object storage failures
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// IO error against a local backend
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backend refused or failed the request
    #[error("storage backend error: {0}")]
    Backend(String),

    /// URL does not belong to this store
    #[error("url is not managed by this store: {0}")]
    ForeignUrl(String),
}

impl StorageError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Commit-time materialization failures
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    /// Upload of one pending image failed; the commit is aborted
    #[error("upload of '{file_name}' failed: {source}")]
    UploadFailed {
        file_name: String,
        reference: TemporaryReference,
        #[source]
        source: StorageError,
    },

    /// A pending image no longer passes validation
    #[error("pending image rejected at upload time: {0}")]
    Rejected(#[from] ValidationError),

    /// The body references a temporary image the registry does not hold
    #[error("document references unknown temporary image: {0}")]
    UnresolvedReference(TemporaryReference),

    /// The body could not be walked or rewritten
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
}

impl MaterializeError {
    /// Name of the file whose upload failed, for the retry message
    #[must_use]
    pub fn failed_file(&self) -> Option<&str> {
        match self {
            Self::UploadFailed { file_name, .. } => Some(file_name),
            Self::Rejected(ValidationError::PayloadTooLarge { name, .. })
            | Self::Rejected(ValidationError::UnsupportedMediaType { name, .. }) => Some(name),
            _ => None,
        }
    }
}

/// Episode persistence failures
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Record rejected by the datastore
    #[error("episode rejected: {0}")]
    Rejected(String),

    /// Episode to update does not exist
    #[error("episode not found: {0}")]
    NotFound(String),

    /// Datastore unavailable
    #[error("datastore unavailable: {0}")]
    Unavailable(String),
}

/// Episode metadata failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// Title blank after trimming
    #[error("title is required")]
    MissingTitle,

    /// Title above the character limit
    #[error("title is too long: {len} characters (max: {max})")]
    TitleTooLong { len: usize, max: usize },

    /// More tags than allowed
    #[error("too many tags: {count} (max: {max})")]
    TooManyTags { count: usize, max: usize },
}

/// Save flow failures, surfaced to whatever notifies the user
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// Metadata invalid, nothing was uploaded
    #[error("invalid episode metadata: {0}")]
    Metadata(#[from] MetadataError),

    /// Materialization failed, nothing was persisted
    #[error("could not store images: {0}")]
    Materialize(#[from] MaterializeError),

    /// A temporary reference survived materialization
    #[error("refusing to persist temporary image reference: {0}")]
    TemporaryReferenceLeak(TemporaryReference),

    /// The datastore call failed
    #[error("could not save episode: {0}")]
    Persistence(#[from] PersistenceError),

    /// The body could not be inspected
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
}

impl SaveError {
    /// Whether the user can retry the same save
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Materialize(MaterializeError::UploadFailed { .. })
                | Self::Persistence(PersistenceError::Unavailable(_))
        )
    }
}

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading the config file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or type error
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantically invalid value
    #[error("invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    /// Create invalid-value error
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}
