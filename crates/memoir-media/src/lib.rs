//! Memoir Media - deferred image upload for episode documents
//!
//! Images inserted while editing are kept in memory behind temporary
//! `blob:` references and only uploaded when the episode is saved:
//! - Validates inserted images (size ceiling, image allow-list)
//! - Tracks pending images in an insertion-ordered registry
//! - Prunes images the author deleted before they are ever uploaded
//! - Uploads at commit time and rewrites the body to durable URLs
//! - Cleans up stored images an update no longer references
//!
//! # Example
//!
//! ```rust,ignore
//! use memoir_media::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(repo: Arc<impl EpisodeRepository>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = MemoirConfig::load("memoir.toml")?;
//! let store = Arc::new(FilesystemObjectStore::from_config(&config.storage));
//! let mut session = EditorSession::new(config.media, store, repo);
//!
//! let photo = ImageFile::from_path("beach.jpg").await?;
//! let reference = session.add_pending_image(photo)?;
//! let body = DocumentBody::markdown("")
//!     .append_image(reference.as_str(), "beach")?;
//!
//! let metadata = EpisodeMetadata::new("Beach day", chrono::NaiveDate::from_ymd_opt(1992, 8, 1).unwrap());
//! let record = session.save(None, metadata, &body).await?;
//! println!("saved {}", record.id);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod episode;
pub mod error;
pub mod materializer;
pub mod observer;
pub mod orphans;
pub mod registry;
pub mod session;
pub mod storage;
pub mod validation;

// Re-exports for convenience
pub use config::{LoggingConfig, MediaConfig, MemoirConfig, StorageConfig};
pub use episode::{
    EpisodeDraft, EpisodeId, EpisodeMetadata, EpisodeRecord, EpisodeRepository, Visibility,
    MAX_TAGS, MAX_TITLE_CHARS,
};
pub use error::{
    ConfigError, MaterializeError, MetadataError, PersistenceError, SaveError, StorageError,
    ValidationError,
};
pub use materializer::{MaterializeStats, Materializer};
pub use observer::{reconcile, MutationObserver, ReconcileOutcome, SkipReason};
pub use orphans::{find_orphaned_images, OrphanSweeper, SweepReport};
pub use registry::{PendingImage, PendingImageId, PendingImageRegistry};
pub use session::EditorSession;
pub use storage::{object_key, FilesystemObjectStore, ObjectStore, UploadObject};
pub use validation::{validate_image, ImageFile, ImageMediaType, UploadLimits, DEFAULT_MAX_IMAGE_BYTES};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for hosting an editor session
    pub use crate::{
        EditorSession, EpisodeMetadata, EpisodeRepository, FilesystemObjectStore, ImageFile,
        MemoirConfig, ObjectStore, SaveError,
    };
    pub use memoir_document::{DocumentBody, DocumentFormat, DurableUrl, TemporaryReference};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
