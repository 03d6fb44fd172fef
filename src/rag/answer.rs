//! Access-filtered retrieval and answer generation.

use super::QueryRewriter;
use crate::config::RuntimeConfig;
use crate::embedding::Embedder;
use crate::error::{AifaqError, Result};
use crate::index::{IndexHandle, SearchFilter, SearchResult};
use crate::llm::ChatModel;
use crate::sources::AccessScope;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Privilege of the caller asking a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Guest,
    User,
    Admin,
}

impl Role {
    /// Search constraint for this role: guests only see public chunks.
    pub fn access_filter(&self) -> SearchFilter {
        match self {
            Role::Guest => SearchFilter::access(AccessScope::Public),
            Role::User | Role::Admin => SearchFilter::All,
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Guest => write!(f, "guest"),
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Settings the pipeline reads per query.
#[derive(Debug, Clone)]
pub struct AnswerConfig {
    pub system_prompt: String,
    pub query_rewriting_prompt: String,
    pub domain_context: String,
    /// Chunks retrieved per query.
    pub k: usize,
    pub use_query_rewriting: bool,
}

impl From<&RuntimeConfig> for AnswerConfig {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            query_rewriting_prompt: config.query_rewriting_prompt.clone(),
            domain_context: config.domain_context.clone(),
            k: config.nr_retrieved_documents,
            use_query_rewriting: config.use_query_rewriting,
        }
    }
}

/// A generated answer and the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    /// Chunks passed to the model, best match first.
    pub sources: Vec<SearchResult>,
    /// The query used for retrieval.
    pub search_query: String,
    /// Set when the query was rewritten.
    pub rewritten_query: Option<String>,
}

/// Join retrieved chunk texts into the grounding context.
pub fn format_context(sources: &[SearchResult]) -> String {
    sources
        .iter()
        .map(|s| s.chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Rewrite, retrieve, answer.
pub struct AnswerPipeline {
    index: Arc<IndexHandle>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    rewriter: QueryRewriter,
    config: AnswerConfig,
}

impl AnswerPipeline {
    pub fn new(
        index: Arc<IndexHandle>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        config: AnswerConfig,
    ) -> Self {
        let rewriter = QueryRewriter::new(Arc::clone(&chat), &config.query_rewriting_prompt);
        Self {
            index,
            embedder,
            chat,
            rewriter,
            config,
        }
    }

    /// Top-k chunks visible to `role`, filtered inside the index search.
    #[instrument(skip(self))]
    pub async fn retrieve(&self, query: &str, role: Role) -> Result<Vec<SearchResult>> {
        let index = self.index.snapshot()?;
        if index.embedding_model() != self.embedder.model() {
            return Err(AifaqError::EmbeddingModelMismatch {
                index: index.embedding_model().to_string(),
                configured: self.embedder.model().to_string(),
            });
        }

        let query_embedding = self.embedder.embed(query).await?;
        let results = index.search(&query_embedding, self.config.k, &role.access_filter());
        debug!("Retrieved {} chunks (k = {})", results.len(), self.config.k);
        Ok(results)
    }

    /// The query to search with: rewritten when enabled and the rewrite succeeds.
    async fn search_query(&self, query: &str) -> Option<String> {
        if !self.config.use_query_rewriting {
            return None;
        }
        match self.rewriter.rewrite(query, &self.config.domain_context).await {
            Ok(rewritten) => Some(rewritten),
            Err(e) => {
                warn!("Query rewriting failed, using the original query: {}", e);
                None
            }
        }
    }

    /// Answer `query` for a caller with `role`.
    #[instrument(skip(self))]
    pub async fn answer(&self, query: &str, role: Role) -> Result<Answer> {
        info!("Answering question");

        let rewritten_query = self.search_query(query).await;
        let search_query = rewritten_query.clone().unwrap_or_else(|| query.to_string());

        let sources = self.retrieve(&search_query, role).await?;
        let context = format_context(&sources);
        let system = format!("{}\n\n{}", self.config.system_prompt, context);

        let answer = self.chat.complete(system.trim_end(), &search_query).await?;

        Ok(Answer {
            answer,
            sources,
            search_query,
            rewritten_query,
        })
    }
}
