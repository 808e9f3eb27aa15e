//! Format codecs for serialized document bodies
//!
//! Each codec walks its own serialization to find image nodes, so
//! rewriting a source never touches prose that happens to contain the
//! same text:
//! - ProseMirror-style JSON trees via serde_json
//! - HTML `<img>` elements via a quote-aware start-tag scanner
//! - CommonMark images via pulldown-cmark

use crate::body::DocumentFormat;
use crate::error::DocumentResult;
use std::ops::Range;

mod html;
mod json;
mod markdown;

pub use html::HtmlCodec;
pub use json::JsonTreeCodec;
pub use markdown::MarkdownCodec;

/// Result of a source rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Serialized document after rewriting
    pub source: String,
    /// Number of image nodes whose source changed
    pub rewritten: usize,
}

/// Structured access to the image nodes of one serialization format
///
/// Implement this trait to support another editor output format.
pub trait DocumentCodec: Send + Sync + 'static {
    /// Format handled by this codec
    fn format(&self) -> DocumentFormat;

    /// Source attribute of every image node, in document order
    fn image_sources(&self, source: &str) -> DocumentResult<Vec<String>>;

    /// Rewrite image sources for which `replace` returns a new value
    ///
    /// Implementations must return `source` byte-for-byte when nothing
    /// is rewritten.
    fn rewrite_sources(
        &self,
        source: &str,
        replace: &dyn Fn(&str) -> Option<String>,
    ) -> DocumentResult<Rewrite>;

    /// Append an image node at the end of the document
    fn append_image(&self, source: &str, src: &str, alt: &str) -> DocumentResult<String>;

    /// Supported file extensions (without dot)
    fn extensions(&self) -> &[&str];
}

/// Apply non-overlapping byte-range edits to `source`
///
/// Edits may arrive in any order; duplicates of the same range collapse.
pub(crate) fn splice(source: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| range.start);
    edits.dedup_by(|a, b| a.0 == b.0);

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        out.push_str(&source[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&source[cursor..]);
    out
}
