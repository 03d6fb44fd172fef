//! aifaq - Retrieval-augmented FAQ answering
//!
//! Builds a searchable knowledge base from an organisation's own content and
//! answers questions grounded in it.
//!
//! # Overview
//!
//! aifaq allows you to:
//! - Ingest web pages, YouTube transcripts, PDF, HTML, ReadTheDocs and text files
//! - Keep a `public` and a `private` dataset in one composite index
//! - Answer questions with citations, hiding private content from guests
//! - Change prompts and models at runtime through persisted overrides
//!
//! # Architecture
//!
//! - `config` - Settings file, prompts and persisted overrides
//! - `extract` - HTML and PDF text extraction
//! - `sources` - Loaders per source kind, with retry and failure isolation
//! - `chunking` - Documents, chunks and the recursive text splitter
//! - `embedding` / `llm` - Embedding and chat model adapters
//! - `index` - Vector index build, merge, persistence and shared access
//! - `rag` - Query rewriting and access-filtered answering
//! - `orchestrator` - The knowledge base build pipeline
//!
//! # Example
//!
//! ```rust,no_run
//! use aifaq::config::{RuntimeConfig, Settings, SqliteOverrideStore};
//! use aifaq::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let store = SqliteOverrideStore::open(&settings.overrides_db())?;
//!     let runtime = RuntimeConfig::resolve(&settings, &store)?;
//!
//!     let orchestrator = Orchestrator::new(settings, &runtime)?;
//!     let report = orchestrator.build_knowledge_base("admin").await?;
//!     println!("Indexed {} chunks", report.entries);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod retry;
pub mod sources;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AifaqError, Result};
