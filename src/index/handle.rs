//! Shared read access to the live index.

use super::{load_index, VectorIndex};
use crate::error::{AifaqError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::info;

/// Holds the index queries run against.
///
/// Readers take an `Arc` snapshot; a rebuild is loaded completely and then
/// swapped in, so in-flight searches keep the snapshot they started with.
pub struct IndexHandle {
    dir: PathBuf,
    embedding_model: String,
    current: RwLock<Arc<VectorIndex>>,
}

impl IndexHandle {
    /// Load the persisted index. Fails if it was never built.
    pub fn open(dir: &Path, embedding_model: &str) -> Result<Self> {
        let index = load_index(dir, Some(embedding_model))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            embedding_model: embedding_model.to_string(),
            current: RwLock::new(Arc::new(index)),
        })
    }

    /// Wrap an index that is already in memory.
    pub fn from_index(dir: &Path, index: VectorIndex) -> Self {
        Self {
            dir: dir.to_path_buf(),
            embedding_model: index.embedding_model().to_string(),
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// Snapshot of the current index.
    pub fn snapshot(&self) -> Result<Arc<VectorIndex>> {
        let guard = self
            .current
            .read()
            .map_err(|e| AifaqError::Index(format!("Failed to acquire lock: {}", e)))?;
        Ok(Arc::clone(&guard))
    }

    /// Swap in a new index.
    pub fn replace(&self, index: VectorIndex) -> Result<()> {
        if index.embedding_model() != self.embedding_model {
            return Err(AifaqError::EmbeddingModelMismatch {
                index: index.embedding_model().to_string(),
                configured: self.embedding_model.clone(),
            });
        }
        let mut guard = self
            .current
            .write()
            .map_err(|e| AifaqError::Index(format!("Failed to acquire lock: {}", e)))?;
        *guard = Arc::new(index);
        Ok(())
    }

    /// Re-read the persisted index and swap it in. On error the current index stays.
    pub fn reload(&self) -> Result<()> {
        let index = load_index(&self.dir, Some(&self.embedding_model))?;
        let entries = index.len();
        self.replace(index)?;
        info!("Reloaded index from {:?} ({} entries)", self.dir, entries);
        Ok(())
    }
}
