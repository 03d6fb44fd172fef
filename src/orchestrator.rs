//! Knowledge base build pipeline.
//!
//! Loads both dataset scopes, chunks and embeds them, merges the private
//! index into the public one and persists the composite index.

use crate::chunking::TextSplitter;
use crate::config::{RuntimeConfig, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{AifaqError, Result};
use crate::index::{save_index, IndexBuilder, VectorIndex};
use crate::sources::{
    AccessScope, FailedSource, HttpFetcher, LoaderRegistry, YouTubeTranscriptClient,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Counts for one access scope.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    pub scope: AccessScope,
    pub documents: usize,
    pub chunks: usize,
    /// Sources loaded without error.
    pub succeeded: usize,
    /// Sources excluded from the corpus, each listed once.
    pub failed: Vec<FailedSource>,
}

/// Outcome of a knowledge base build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub owner: String,
    pub scopes: Vec<ScopeReport>,
    /// Entries in the composite index.
    pub entries: usize,
    pub persist_directory: PathBuf,
}

impl BuildReport {
    pub fn succeeded(&self) -> usize {
        self.scopes.iter().map(|s| s.succeeded).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FailedSource> {
        self.scopes.iter().flat_map(|s| s.failed.iter())
    }
}

/// Runs the build pipeline.
pub struct Orchestrator {
    settings: Settings,
    registry: LoaderRegistry,
    splitter: TextSplitter,
    builder: IndexBuilder,
}

impl Orchestrator {
    /// Wire the network-backed loaders and the configured embedding model.
    pub fn new(settings: Settings, runtime: &RuntimeConfig) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ingest.request_timeout_seconds);
        let fetcher = Arc::new(HttpFetcher::new(timeout)?);
        let transcripts = Arc::new(YouTubeTranscriptClient::new(timeout)?);
        let registry = LoaderRegistry::standard(&settings, fetcher, transcripts);
        let embedder = Arc::new(OpenAIEmbedder::new(runtime.provider, &runtime.embedding_model)?);

        Self::with_components(settings, registry, embedder)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        registry: LoaderRegistry,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let splitter = TextSplitter::new(settings.ingest.chunk_size, settings.ingest.chunk_overlap)?;
        Ok(Self {
            settings,
            registry,
            splitter,
            builder: IndexBuilder::new(embedder),
        })
    }

    /// Build the composite index in memory without persisting it.
    ///
    /// Fails with [`AifaqError::EmptyCorpus`] when neither scope yields a chunk.
    #[instrument(skip(self))]
    pub async fn build_index(&self, owner: &str) -> Result<(VectorIndex, Vec<ScopeReport>)> {
        let mut composite: Option<VectorIndex> = None;
        let mut reports = Vec::new();

        for scope in AccessScope::ALL {
            let root = self.settings.scope_root(scope);
            if !root.is_dir() {
                warn!("Dataset root for the {} scope does not exist: {:?}", scope, root);
            }

            let outcome = self.registry.load_all(&root).await;
            let chunks = self.splitter.chunk_documents(&outcome.documents);
            info!(
                "{} scope: {} documents, {} chunks",
                scope,
                outcome.documents.len(),
                chunks.len()
            );

            reports.push(ScopeReport {
                scope,
                documents: outcome.documents.len(),
                chunks: chunks.len(),
                succeeded: outcome.report.succeeded,
                failed: outcome.report.failed,
            });

            if let Some(index) = self.builder.build(chunks, scope, owner).await? {
                composite = Some(match composite {
                    Some(base) => base.merge(index)?,
                    None => index,
                });
            }
        }

        let index = composite.ok_or(AifaqError::EmptyCorpus)?;
        Ok((index, reports))
    }

    /// Build the composite index and replace the persisted one.
    #[instrument(skip(self))]
    pub async fn build_knowledge_base(&self, owner: &str) -> Result<BuildReport> {
        let (index, scopes) = self.build_index(owner).await?;
        let persist_directory = self.settings.persist_directory();
        save_index(&index, &persist_directory)?;

        let report = BuildReport {
            owner: owner.to_string(),
            scopes,
            entries: index.len(),
            persist_directory,
        };
        info!(
            "Knowledge base built: {} entries, {} sources ok, {} failed",
            report.entries,
            report.succeeded(),
            report.failed().count()
        );
        Ok(report)
    }
}
