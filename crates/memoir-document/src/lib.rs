//! Memoir Document Model
//!
//! Serialized episode bodies and structured access to their image nodes.
//!
//! # Core Concepts
//!
//! - [`DocumentBody`]: serialized rich-text tree in a [`DocumentFormat`]
//! - [`DocumentCodec`]: walks one format's image nodes and rewrites their sources
//! - [`TemporaryReference`]: `blob:` handle to image data not yet stored
//! - [`DurableUrl`]: address of an image in object storage
//! - [`ContentHash`]: Blake3 hash for object key tags and change detection
//!
//! # Example
//!
//! ```rust
//! use memoir_document::DocumentBody;
//! use std::collections::HashMap;
//!
//! let body = DocumentBody::html(r#"<p>blob:x/1</p><img src="blob:x/1">"#);
//! let replacements = HashMap::from([(
//!     "blob:x/1".to_string(),
//!     "https://cdn.example/1.jpg".to_string(),
//! )]);
//!
//! let (durable, rewritten) = body.rewrite_image_sources(&replacements).unwrap();
//! assert_eq!(rewritten, 1);
//! assert_eq!(
//!     durable.source(),
//!     r#"<p>blob:x/1</p><img src="https://cdn.example/1.jpg">"#
//! );
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod body;
pub mod codecs;
mod error;
mod hash;
mod reference;

pub use body::{DocumentBody, DocumentFormat};
pub use codecs::{DocumentCodec, Rewrite};
pub use error::{DocumentError, DocumentResult};
pub use hash::ContentHash;
pub use reference::{is_temporary, DurableUrl, ImageSource, TemporaryReference, TEMPORARY_SCHEME};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
