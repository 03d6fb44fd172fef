//! CLI command implementations.

mod ask;
mod build;
mod config;
mod init;
mod inspect;
mod search;

pub use ask::run_ask;
pub use build::run_build;
pub use config::run_config;
pub use init::run_init;
pub use inspect::run_inspect;
pub use search::run_search;

use crate::config::{RuntimeConfig, Settings, SqliteOverrideStore};
use crate::embedding::OpenAIEmbedder;
use crate::index::IndexHandle;
use crate::llm::OpenAIChat;
use crate::rag::{AnswerConfig, AnswerPipeline};
use std::sync::Arc;

/// Resolve runtime values: persisted overrides over the configuration file.
pub(crate) fn runtime_config(settings: &Settings) -> anyhow::Result<RuntimeConfig> {
    let store = SqliteOverrideStore::open(&settings.overrides_db())?;
    Ok(RuntimeConfig::resolve(settings, &store)?)
}

/// Wire the answering pipeline against the persisted index.
pub(crate) fn answer_pipeline(
    settings: &Settings,
    runtime: &RuntimeConfig,
    config: AnswerConfig,
) -> anyhow::Result<AnswerPipeline> {
    let handle = IndexHandle::open(&settings.persist_directory(), &runtime.embedding_model)?;
    let embedder = OpenAIEmbedder::new(runtime.provider, &runtime.embedding_model)?;
    let chat = OpenAIChat::new(runtime.provider, &runtime.model_name)?
        .with_temperature(runtime.temperature);

    Ok(AnswerPipeline::new(
        Arc::new(handle),
        Arc::new(embedder),
        Arc::new(chat),
        config,
    ))
}
