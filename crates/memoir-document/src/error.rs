//! Error types for document bodies

use crate::body::DocumentFormat;

/// Errors walking or rewriting a document body
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Body could not be parsed in its declared format
    #[error("malformed {format} document: {message}")]
    Malformed {
        format: DocumentFormat,
        message: String,
    },

    /// An image node was found but its source could not be located for rewriting
    #[error("cannot locate image source '{src}' in {format} document")]
    SourceNotLocated { format: DocumentFormat, src: String },

    /// File extension does not map to a known format
    #[error("unknown document format for extension: '{0}'")]
    UnknownFormat(String),
}

impl DocumentError {
    /// Create malformed-document error
    pub fn malformed(format: DocumentFormat, message: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            message: message.into(),
        }
    }

    /// Create source-not-located error
    pub fn source_not_located(format: DocumentFormat, src: impl Into<String>) -> Self {
        Self::SourceNotLocated {
            format,
            src: src.into(),
        }
    }
}

/// Result alias for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;
