//! Filesystem object store
//!
//! Writes objects under a root directory and serves them from a public
//! base URL that maps onto it: `{public_base_url}/{key}` ↔ `{root}/{key}`.

use super::{ObjectStore, UploadObject};
use crate::config::StorageConfig;
use crate::error::StorageError;
use async_trait::async_trait;
use memoir_document::DurableUrl;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use ulid::Ulid;

/// Object store backed by a local directory
#[derive(Debug, Clone)]
pub struct FilesystemObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl FilesystemObjectStore {
    /// Create store rooted at `root`, served from `public_base_url`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create store from configuration
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.root.clone(), config.public_base_url.clone())
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for_key(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        // Keys come from URLs on delete; never let them escape the root
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::Backend(format!("invalid object key: {key}")));
        }
        Ok(self.root.join(relative))
    }

    fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(&self.public_base_url)?
            .strip_prefix('/')
            .filter(|key| !key.is_empty())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{}.tmp", Ulid::new()));
    path.with_file_name(name)
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn upload(&self, object: UploadObject) -> Result<DurableUrl, StorageError> {
        let path = self.path_for_key(&object.key)?;
        let url = DurableUrl::new(format!("{}/{}", self.public_base_url, object.key));

        // Keys are unique per pending image, so an existing object is a retried upload
        if fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::io_error(&path, e))?
        {
            tracing::debug!(key = %object.key, "object already stored");
            return Ok(url);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io_error(parent, e))?;
        }

        // Atomic write: temp file + rename; concurrent writers never share a temp file
        let temp_path = temp_path_for(&path);
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StorageError::io_error(&temp_path, e))?;
        file.write_all(&object.data)
            .await
            .map_err(|e| StorageError::io_error(&temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::io_error(&temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StorageError::io_error(&path, e))?;

        tracing::debug!(
            key = %object.key,
            file = %object.file_name,
            bytes = object.data.len(),
            content_type = object.content_type,
            "object stored"
        );
        Ok(url)
    }

    async fn delete(&self, url: &DurableUrl) -> Result<(), StorageError> {
        let key = self
            .key_for_url(url.as_str())
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;
        let path = self.path_for_key(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key, "object deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io_error(path, e)),
        }
    }

    fn owns(&self, url: &str) -> bool {
        self.key_for_url(url).is_some()
    }
}
