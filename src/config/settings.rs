//! Configuration settings for aifaq.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub dataset: DatasetSettings,
    pub index: IndexSettings,
    pub llm: LlmSettings,
    pub prompts: PromptSettings,
    pub retrieval: RetrievalSettings,
    pub ingest: IngestSettings,
}

/// Dataset layout. Each scope root holds the same fixed sub-paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSettings {
    /// Root of the `public` scope.
    pub public_path: String,
    /// Root of the `private` scope.
    pub private_path: String,
    pub text_files: String,
    pub html_files: String,
    pub pdf_files: String,
    pub rtdocs_files: String,
    /// Folder of files with one YouTube URL per line.
    pub yt_video_links: String,
    /// Folder of files with one web URL per line.
    pub web_urls: String,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            public_path: "./dataset/public".to_string(),
            private_path: "./dataset/private".to_string(),
            text_files: "text_files".to_string(),
            html_files: "html_files".to_string(),
            pdf_files: "pdf_files".to_string(),
            rtdocs_files: "rtdocs_files".to_string(),
            yt_video_links: "yt_video_links".to_string(),
            web_urls: "web_urls".to_string(),
        }
    }
}

/// Vector index persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Directory holding the persisted composite index.
    pub persist_directory: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            persist_directory: "./faiss_index".to_string(),
        }
    }
}

/// Chat and embedding provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Mistral,
}

impl LlmProvider {
    /// Base URL of the provider's OpenAI-compatible API.
    pub fn api_base(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com/v1",
            LlmProvider::Mistral => "https://api.mistral.ai/v1",
        }
    }

    /// Environment variables checked, in order, for the API key.
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            LlmProvider::OpenAi => &["OPENAI_API_KEY"],
            LlmProvider::Mistral => &["MISTRAL_API_KEY", "MISTRALAI_API_KEY"],
        }
    }

    /// Read the API key for this provider from the environment.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_vars()
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|key| !key.is_empty())
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "mistral" | "mistralai" => Ok(LlmProvider::Mistral),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenAi => write!(f, "openai"),
            LlmProvider::Mistral => write!(f, "mistral"),
        }
    }
}

/// Chat/embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    /// Chat model used for answering and query rewriting.
    pub model_name: String,
    /// Embedding model used for both index construction and query encoding.
    pub embedding_model: String,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model_name: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.7,
        }
    }
}

/// Prompt file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Path to the answering system prompt file.
    pub system_prompt: String,
    /// Path to the query rewriting prompt file.
    pub query_rewriting_prompt: String,
    /// SQLite file holding persisted overrides.
    pub overrides_db: String,
    /// Domain the rewritten queries should focus on.
    pub domain_context: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            system_prompt: "./prompts/system_prompt.md".to_string(),
            query_rewriting_prompt: "./prompts/query_rewriting_prompt.md".to_string(),
            overrides_db: "./aifaq.db".to_string(),
            domain_context: "Founder Institute Keystone Chapter".to_string(),
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of chunks retrieved per query (k).
    pub nr_retrieved_documents: usize,
    /// Search with the rewritten query instead of the raw one.
    pub use_query_rewriting: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            nr_retrieved_documents: 5,
            use_query_rewriting: true,
        }
    }
}

/// Ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Attempts per URL or video before it is recorded as failed.
    pub max_download_retries: u32,
    /// Delay before the first retry; grows with every retry.
    pub retry_delay_seconds: u64,
    /// Upper bound for the retry delay.
    pub max_retry_delay_seconds: u64,
    pub backoff_growth: crate::retry::BackoffGrowth,
    /// Link depth followed from each start URL (0 = start page only).
    pub crawl_depth: usize,
    /// Concurrent network fetches during ingestion.
    pub max_concurrent_fetches: usize,
    pub request_timeout_seconds: u64,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_download_retries: 3,
            retry_delay_seconds: 2,
            max_retry_delay_seconds: 30,
            backoff_growth: crate::retry::BackoffGrowth::Linear,
            crawl_depth: 1,
            max_concurrent_fetches: 4,
            request_timeout_seconds: 30,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.ingest.chunk_size == 0 {
            return Err(crate::error::AifaqError::Config(
                "ingest.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(crate::error::AifaqError::Config(format!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap, self.ingest.chunk_size
            )));
        }
        if self.retrieval.nr_retrieved_documents == 0 {
            return Err(crate::error::AifaqError::Config(
                "retrieval.nr_retrieved_documents must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AifaqError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aifaq")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Dataset root for an access scope.
    pub fn scope_root(&self, scope: crate::sources::AccessScope) -> PathBuf {
        match scope {
            crate::sources::AccessScope::Public => Self::expand_path(&self.dataset.public_path),
            crate::sources::AccessScope::Private => Self::expand_path(&self.dataset.private_path),
        }
    }

    /// Get the expanded index directory.
    pub fn persist_directory(&self) -> PathBuf {
        Self::expand_path(&self.index.persist_directory)
    }

    /// Get the expanded override database path.
    pub fn overrides_db(&self) -> PathBuf {
        Self::expand_path(&self.prompts.overrides_db)
    }
}
