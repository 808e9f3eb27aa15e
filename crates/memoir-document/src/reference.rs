//! Image source references
//!
//! An image node points either at a temporary `blob:` handle that only the
//! current editing session can resolve, or at a durable URL in object
//! storage. Inline `data:` URIs are left alone by every pipeline stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheme prefix of every temporary reference
pub const TEMPORARY_SCHEME: &str = "blob:";

const INLINE_SCHEME: &str = "data:";

/// Whether `src` is a temporary (session-local) reference
#[inline]
#[must_use]
pub fn is_temporary(src: &str) -> bool {
    src.get(..TEMPORARY_SCHEME.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(TEMPORARY_SCHEME))
}

/// Locally resolvable handle to unsaved image data
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemporaryReference(String);

impl TemporaryReference {
    /// Generate a fresh reference under `origin`, e.g. `blob:memoir/<uuid>`
    #[must_use]
    pub fn generate(origin: &str) -> Self {
        Self(format!("{TEMPORARY_SCHEME}{origin}/{}", uuid::Uuid::new_v4()))
    }

    /// Wrap an existing string, if it carries the temporary scheme
    #[must_use]
    pub fn parse(src: &str) -> Option<Self> {
        is_temporary(src).then(|| Self(src.to_string()))
    }

    /// Reference as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemporaryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TemporaryReference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for TemporaryReference {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Globally resolvable address of a stored image
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurableUrl(String);

impl DurableUrl {
    /// Wrap a URL returned by object storage
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// URL as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DurableUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DurableUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Classification of an image node's source attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// `blob:` handle, must be materialized before persisting
    Temporary,
    /// Anything resolvable without the session
    Durable,
    /// `data:` URI embedded in the document
    Inline,
}

impl ImageSource {
    /// Classify a source string
    #[must_use]
    pub fn classify(src: &str) -> Self {
        if is_temporary(src) {
            Self::Temporary
        } else if src
            .get(..INLINE_SCHEME.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(INLINE_SCHEME))
        {
            Self::Inline
        } else {
            Self::Durable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_references_are_temporary_and_unique() {
        let a = TemporaryReference::generate("memoir");
        let b = TemporaryReference::generate("memoir");
        assert!(a.as_str().starts_with("blob:memoir/"));
        assert!(is_temporary(a.as_str()));
        assert_ne!(a, b);
    }

    #[test]
    fn scheme_check_ignores_case() {
        assert!(is_temporary("BLOB:http://localhost/abc"));
        assert!(!is_temporary("https://cdn.example/blob:x"));
        assert!(!is_temporary("blo"));
    }

    #[test]
    fn parse_requires_scheme() {
        assert!(TemporaryReference::parse("blob:x/1").is_some());
        assert!(TemporaryReference::parse("https://cdn/x.jpg").is_none());
    }

    #[test]
    fn classify_sources() {
        assert_eq!(ImageSource::classify("blob:memoir/1"), ImageSource::Temporary);
        assert_eq!(ImageSource::classify("data:image/png;base64,AAAA"), ImageSource::Inline);
        assert_eq!(ImageSource::classify("https://cdn/x.jpg"), ImageSource::Durable);
        assert_eq!(ImageSource::classify("/uploads/x.jpg"), ImageSource::Durable);
    }
}
