//! Documents, chunks and the recursive-boundary splitter.
//!
//! Loaders produce [`Document`]s; the [`TextSplitter`] cuts them into
//! [`Chunk`]s that the index builder embeds.

mod splitter;

pub use splitter::{Span, TextSplitter};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// String metadata attached to documents and chunks. Ordered for stable output.
pub type Metadata = BTreeMap<String, String>;

/// Origin of the content (URL or file path). Always present.
pub const META_SOURCE: &str = "source";
/// Identity that triggered the build.
pub const META_OWNER: &str = "owner";
/// Access scope tag, `public` or `private`.
pub const META_ACCESS: &str = "access";
pub const META_TITLE: &str = "title";
/// 0-based page number for PDF pages.
pub const META_PAGE: &str = "page";
pub const META_TOTAL_PAGES: &str = "total_pages";
pub const META_VIDEO_ID: &str = "video_id";
/// Loader that produced the document.
pub const META_KIND: &str = "kind";

/// A unit of extracted content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Cleaned plain text.
    pub content: String,
    pub metadata: Metadata,
    pub id: Option<String>,
}

impl Document {
    /// Create a document with its `source` metadata set.
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(META_SOURCE.to_string(), source.into());
        Self {
            content: content.into(),
            metadata,
            id: None,
        }
    }

    /// Add a metadata entry.
    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn source(&self) -> &str {
        self.metadata.get(META_SOURCE).map(String::as_str).unwrap_or("")
    }
}

/// A bounded fragment of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Metadata inherited from the source document.
    pub metadata: Metadata,
    /// Char offset of `text` within the document content.
    pub offset: usize,
    /// Position of the chunk within its document.
    pub ordinal: usize,
    /// Position of the source document within the loaded sequence.
    pub document_index: usize,
}

impl Chunk {
    pub fn source(&self) -> &str {
        self.metadata.get(META_SOURCE).map(String::as_str).unwrap_or("")
    }

    pub fn access(&self) -> Option<&str> {
        self.metadata.get(META_ACCESS).map(String::as_str)
    }

    /// Short display label: title if known, otherwise the source.
    pub fn label(&self) -> String {
        let base = self
            .metadata
            .get(META_TITLE)
            .cloned()
            .unwrap_or_else(|| self.source().to_string());
        match self.metadata.get(META_PAGE) {
            Some(page) => format!("{} (page {})", base, page),
            None => base,
        }
    }
}
