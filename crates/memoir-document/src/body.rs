//! Episode document bodies
//!
//! A [`DocumentBody`] is the serialized rich-text tree the editor hands
//! over on every content change and at save time. All image handling goes
//! through the codec of its [`DocumentFormat`].

use crate::codecs::{DocumentCodec, HtmlCodec, JsonTreeCodec, MarkdownCodec};
use crate::error::{DocumentError, DocumentResult};
use crate::hash::ContentHash;
use crate::reference::{ImageSource, TemporaryReference};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

/// Serialization format of a document body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// ProseMirror-style JSON node tree
    #[default]
    Json,
    /// Serialized HTML
    Html,
    /// CommonMark
    Markdown,
}

impl DocumentFormat {
    /// Codec that understands this format
    #[must_use]
    pub fn codec(self) -> &'static dyn DocumentCodec {
        match self {
            Self::Json => &JsonTreeCodec,
            Self::Html => &HtmlCodec,
            Self::Markdown => &MarkdownCodec,
        }
    }

    /// Map a file extension (without dot) to a format
    ///
    /// # Errors
    /// `DocumentError::UnknownFormat` when no codec claims the extension
    pub fn from_extension(ext: &str) -> DocumentResult<Self> {
        let ext = ext.to_ascii_lowercase();
        [Self::Json, Self::Html, Self::Markdown]
            .into_iter()
            .find(|format| format.codec().extensions().contains(&ext.as_str()))
            .ok_or(DocumentError::UnknownFormat(ext))
    }

    /// Format implied by a file path's extension
    ///
    /// # Errors
    /// `DocumentError::UnknownFormat` for missing or unknown extensions
    pub fn from_path(path: impl AsRef<Path>) -> DocumentResult<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        Self::from_extension(ext)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Html => "html",
            Self::Markdown => "markdown",
        })
    }
}

/// Serialized document body of an episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBody {
    format: DocumentFormat,
    source: String,
}

impl DocumentBody {
    /// Wrap serialized content
    #[inline]
    #[must_use]
    pub fn new(format: DocumentFormat, source: impl Into<String>) -> Self {
        Self {
            format,
            source: source.into(),
        }
    }

    /// JSON node tree body
    #[inline]
    #[must_use]
    pub fn json(source: impl Into<String>) -> Self {
        Self::new(DocumentFormat::Json, source)
    }

    /// HTML body
    #[inline]
    #[must_use]
    pub fn html(source: impl Into<String>) -> Self {
        Self::new(DocumentFormat::Html, source)
    }

    /// Markdown body
    #[inline]
    #[must_use]
    pub fn markdown(source: impl Into<String>) -> Self {
        Self::new(DocumentFormat::Markdown, source)
    }

    /// Serialization format
    #[inline]
    #[must_use]
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Serialized content
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Consume into serialized content
    #[inline]
    #[must_use]
    pub fn into_source(self) -> String {
        self.source
    }

    /// Hash of format and content
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        let mut data = Vec::with_capacity(self.source.len() + 9);
        data.extend_from_slice(self.format.to_string().as_bytes());
        data.push(0);
        data.extend_from_slice(self.source.as_bytes());
        ContentHash::compute(&data)
    }

    /// Source of every image node, in document order, duplicates included
    ///
    /// # Errors
    /// `DocumentError::Malformed` if the body cannot be parsed
    pub fn image_sources(&self) -> DocumentResult<Vec<String>> {
        self.format.codec().image_sources(&self.source)
    }

    /// Distinct temporary references used by image nodes
    ///
    /// # Errors
    /// `DocumentError::Malformed` if the body cannot be parsed
    pub fn temporary_references(&self) -> DocumentResult<BTreeSet<TemporaryReference>> {
        Ok(self
            .image_sources()?
            .iter()
            .filter_map(|src| TemporaryReference::parse(src))
            .collect())
    }

    /// Distinct durable sources used by image nodes
    ///
    /// # Errors
    /// `DocumentError::Malformed` if the body cannot be parsed
    pub fn durable_sources(&self) -> DocumentResult<BTreeSet<String>> {
        Ok(self
            .image_sources()?
            .into_iter()
            .filter(|src| ImageSource::classify(src) == ImageSource::Durable)
            .collect())
    }

    /// Rewrite image sources found in `replacements`, every occurrence
    ///
    /// Returns the rewritten body and the number of image nodes changed.
    ///
    /// # Errors
    /// `DocumentError` if the body cannot be parsed or a source cannot be located
    pub fn rewrite_image_sources(
        &self,
        replacements: &HashMap<String, String>,
    ) -> DocumentResult<(Self, usize)> {
        if replacements.is_empty() {
            return Ok((self.clone(), 0));
        }
        let rewrite = self
            .format
            .codec()
            .rewrite_sources(&self.source, &|src| replacements.get(src).cloned())?;
        Ok((Self::new(self.format, rewrite.source), rewrite.rewritten))
    }

    /// Append an image node, as the editor does on insertion
    ///
    /// # Errors
    /// `DocumentError::Malformed` if the body cannot be parsed
    pub fn append_image(&self, src: &str, alt: &str) -> DocumentResult<Self> {
        let source = self.format.codec().append_image(&self.source, src, alt)?;
        Ok(Self::new(self.format, source))
    }
}
