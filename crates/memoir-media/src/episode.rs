//! Episode records and the persistence boundary
//!
//! An episode is one memoir entry: metadata plus a rich-text body. The
//! body handed to [`EpisodeRepository::save_episode`] must already be
//! materialized.

use crate::error::{MetadataError, PersistenceError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use memoir_document::{DocumentBody, DurableUrl};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use ulid::Ulid;

/// Maximum title length in characters
pub const MAX_TITLE_CHARS: usize = 200;

/// Maximum number of tags per episode
pub const MAX_TAGS: usize = 20;

/// Unique episode identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpisodeId(pub Ulid);

impl EpisodeId {
    /// Generate new episode ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for EpisodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who can read an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Author only
    #[default]
    Private,
    /// Invited family members
    Family,
    /// Anyone with the link
    Public,
}

/// Episode metadata entered alongside the body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub title: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

impl EpisodeMetadata {
    /// Create metadata with no tags and private visibility
    #[must_use]
    pub fn new(title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            date,
            tags: Vec::new(),
            visibility: Visibility::default(),
        }
    }

    /// Set tags
    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set visibility
    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Trim the title and tags, drop blank and duplicate tags, then validate
    ///
    /// # Errors
    /// `MetadataError` if the normalized metadata breaks a limit
    pub fn normalized(self) -> Result<Self, MetadataError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(MetadataError::MissingTitle);
        }
        let len = title.chars().count();
        if len > MAX_TITLE_CHARS {
            return Err(MetadataError::TitleTooLong {
                len,
                max: MAX_TITLE_CHARS,
            });
        }

        let mut seen = HashSet::new();
        let tags: Vec<String> = self
            .tags
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .filter(|tag| seen.insert(tag.to_lowercase()))
            .map(str::to_string)
            .collect();
        if tags.len() > MAX_TAGS {
            return Err(MetadataError::TooManyTags {
                count: tags.len(),
                max: MAX_TAGS,
            });
        }

        Ok(Self {
            title,
            tags,
            ..self
        })
    }
}

/// Episode to create (`id == None`) or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeDraft {
    pub id: Option<EpisodeId>,
    pub metadata: EpisodeMetadata,
    pub body: DocumentBody,
}

/// Persisted episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub id: EpisodeId,
    pub metadata: EpisodeMetadata,
    pub body: DocumentBody,
    pub updated_at: DateTime<Utc>,
}

/// Episode datastore
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EpisodeRepository: Send + Sync {
    /// Load an episode, `None` if it does not exist
    async fn load_episode(&self, id: EpisodeId) -> Result<Option<EpisodeRecord>, PersistenceError>;

    /// Create or update an episode
    async fn save_episode(&self, draft: EpisodeDraft) -> Result<EpisodeRecord, PersistenceError>;

    /// Whether any episode other than `excluding` uses `url` as an image source
    async fn references_image(
        &self,
        url: &DurableUrl,
        excluding: EpisodeId,
    ) -> Result<bool, PersistenceError>;
}
