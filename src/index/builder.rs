//! Embeds chunks into a [`VectorIndex`].

use super::{IndexEntry, VectorIndex, CHUNK_NAMESPACE};
use crate::chunking::{Chunk, META_ACCESS, META_OWNER};
use crate::embedding::Embedder;
use crate::error::{AifaqError, Result};
use crate::sources::AccessScope;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Deterministic id of a chunk within a scope.
///
/// Derived from scope, source, document position, chunk position and offset,
/// so an unchanged dataset yields the same ids on every build.
pub fn chunk_id(scope: AccessScope, chunk: &Chunk) -> String {
    let name = format!(
        "{}/{}/{}/{}/{}",
        scope,
        chunk.source(),
        chunk.document_index,
        chunk.ordinal,
        chunk.offset
    );
    Uuid::new_v5(&CHUNK_NAMESPACE, name.as_bytes()).to_string()
}

/// Builds a scope index from chunks.
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Tag chunks with `owner` and `scope`, embed them and index them.
    ///
    /// Returns `None` when there are no chunks, so an empty dataset is never
    /// mistaken for a usable index.
    #[instrument(skip(self, chunks), fields(scope = %scope, count = chunks.len()))]
    pub async fn build(
        &self,
        chunks: Vec<Chunk>,
        scope: AccessScope,
        owner: &str,
    ) -> Result<Option<VectorIndex>> {
        if chunks.is_empty() {
            info!("No chunks for the {} scope; no index produced", scope);
            return Ok(None);
        }

        let chunks: Vec<Chunk> = chunks
            .into_iter()
            .map(|mut chunk| {
                chunk.metadata.insert(META_OWNER.to_string(), owner.to_string());
                chunk.metadata.insert(META_ACCESS.to_string(), scope.as_str().to_string());
                chunk
            })
            .collect();

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(AifaqError::ExternalService(format!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or(0);
        let mut index = VectorIndex::new(self.embedder.model(), dimensions);
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            let id = chunk_id(scope, &chunk);
            index.insert(IndexEntry { id, chunk, embedding })?;
        }

        info!("Built {} index with {} entries", scope, index.len());
        Ok(Some(index))
    }
}
