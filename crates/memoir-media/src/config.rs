//! Pipeline configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! [media]
//! upload_concurrency = 2
//!
//! [media.limits]
//! max_bytes = 10485760
//! allowed_types = ["jpeg", "png", "webp", "gif"]
//!
//! [storage]
//! root = "/var/lib/memoir/objects"
//! public_base_url = "https://cdn.example.com/memoir"
//! ```

use crate::error::ConfigError;
use crate::validation::UploadLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoirConfig {
    /// Registry and materializer settings
    pub media: MediaConfig,
    /// Filesystem object store settings
    pub storage: StorageConfig,
    /// Log output settings (used by binaries)
    pub logging: LoggingConfig,
}

impl MemoirConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` or `ConfigError::Invalid`
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io`, `ConfigError::Parse` or `ConfigError::Invalid`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// With media settings
    #[inline]
    #[must_use]
    pub fn with_media(mut self, media: MediaConfig) -> Self {
        self.media = media;
        self
    }

    /// With storage settings
    #[inline]
    #[must_use]
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Check semantic constraints
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.media.validate()?;
        if self.storage.public_base_url.trim().is_empty() {
            return Err(ConfigError::invalid("storage.public_base_url", "must not be empty"));
        }
        Ok(())
    }
}

/// Registry and materializer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Size and type limits
    pub limits: UploadLimits,
    /// Origin segment of generated `blob:` references
    pub temporary_origin: String,
    /// Uploads in flight at once during a commit (1 = sequential)
    pub upload_concurrency: usize,
    /// Key prefix for stored objects
    pub object_key_prefix: String,
}

impl MediaConfig {
    /// Create default media configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With limits
    #[inline]
    #[must_use]
    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    /// With upload concurrency
    #[inline]
    #[must_use]
    pub fn with_upload_concurrency(mut self, concurrency: usize) -> Self {
        self.upload_concurrency = concurrency;
        self
    }

    /// With temporary reference origin
    #[inline]
    #[must_use]
    pub fn with_temporary_origin(mut self, origin: impl Into<String>) -> Self {
        self.temporary_origin = origin.into();
        self
    }

    /// Check semantic constraints
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload_concurrency == 0 {
            return Err(ConfigError::invalid("media.upload_concurrency", "must be at least 1"));
        }
        if self.limits.max_bytes == 0 {
            return Err(ConfigError::invalid("media.limits.max_bytes", "must be positive"));
        }
        if self.limits.allowed_types.is_empty() {
            return Err(ConfigError::invalid("media.limits.allowed_types", "must not be empty"));
        }
        if self.temporary_origin.is_empty() || self.temporary_origin.contains(char::is_whitespace) {
            return Err(ConfigError::invalid(
                "media.temporary_origin",
                "must be non-empty without whitespace",
            ));
        }
        Ok(())
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            limits: UploadLimits::default(),
            temporary_origin: "memoir".to_string(),
            upload_concurrency: 1,
            object_key_prefix: "episodes".to_string(),
        }
    }
}

/// Filesystem object store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory objects are written under
    pub root: PathBuf,
    /// Public URL prefix that maps onto `root`
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("objects"),
            public_base_url: "http://localhost:8080/objects".to_string(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}
