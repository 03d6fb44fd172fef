//! Configuration module for aifaq.
//!
//! Handles the static settings file, prompt templates and persisted overrides.

pub mod overrides;
mod prompts;
mod settings;

pub use overrides::{
    resolve, MemoryOverrideStore, OverrideStore, RuntimeConfig, SqliteOverrideStore,
};
pub use prompts::{read_prompt_file, Prompts, DEFAULT_QUERY_REWRITING_PROMPT, DEFAULT_SYSTEM_PROMPT};
pub use settings::{
    DatasetSettings, IndexSettings, IngestSettings, LlmProvider, LlmSettings, PromptSettings,
    RetrievalSettings, Settings,
};
