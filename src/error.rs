//! Error types for aifaq.

use std::path::PathBuf;
use thiserror::Error;

/// Library-level error type for aifaq operations.
///
/// Batch ingestion catches `SourceFetch` and `Extraction` per item; the
/// remaining variants surface to whoever called `build` or `answer`.
#[derive(Error, Debug)]
pub enum AifaqError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to fetch {source_id}: {message}")]
    SourceFetch {
        source_id: String,
        message: String,
        /// Network and timeout failures are worth retrying; malformed input is not.
        transient: bool,
    },

    #[error("Extraction failed for {source_id}: {message}")]
    Extraction { source_id: String, message: String },

    #[error("Index not found at {0}. Run 'aifaq build' first.")]
    IndexNotFound(PathBuf),

    #[error("Knowledge base build produced no chunks (all datasets are empty)")]
    EmptyCorpus,

    #[error("Index was built with embedding model '{index}' but '{configured}' is configured. Rebuild the index.")]
    EmbeddingModelMismatch { index: String, configured: String },

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AifaqError {
    /// Build a fetch error that the retry policy will try again.
    pub fn transient(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        AifaqError::SourceFetch {
            source_id: source_id.into(),
            message: message.into(),
            transient: true,
        }
    }

    /// Build a fetch error that is skipped without retrying.
    pub fn permanent(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        AifaqError::SourceFetch {
            source_id: source_id.into(),
            message: message.into(),
            transient: false,
        }
    }

    /// Whether retrying the failed operation could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AifaqError::SourceFetch { transient, .. } => *transient,
            AifaqError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

/// Result type alias for aifaq operations.
pub type Result<T> = std::result::Result<T, AifaqError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_classification() {
        assert!(AifaqError::transient("https://a", "timeout").is_transient());
        assert!(!AifaqError::permanent("https://a", "bad url").is_transient());
        assert!(!AifaqError::EmptyCorpus.is_transient());
    }

    #[test]
    fn test_index_not_found_is_actionable() {
        let err = AifaqError::IndexNotFound(PathBuf::from("/tmp/idx"));
        assert!(err.to_string().contains("aifaq build"));
    }
}
