//! Config command implementation.

use crate::cli::{ConfigAction, Output, PromptKind};
use crate::config::overrides::{check_key, KEY_QUERY_REWRITING_PROMPT, KEY_SYSTEM_PROMPT};
use crate::config::{read_prompt_file, OverrideStore, RuntimeConfig, Settings, SqliteOverrideStore};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings, config_path: &Path) -> Result<()> {
    let store = SqliteOverrideStore::open(&settings.overrides_db())?;

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);

            let overrides = store.all()?;
            let runtime = RuntimeConfig::resolve(&settings, &store)?;
            Output::header("Resolved runtime values");
            let mark = |key: &str| if overrides.contains_key(key) { " (override)" } else { "" };
            Output::kv("llm_provider", &format!("{}{}", runtime.provider, mark("llm_provider")));
            Output::kv("model_name", &format!("{}{}", runtime.model_name, mark("model_name")));
            Output::kv(
                "embedding_model",
                &format!("{}{}", runtime.embedding_model, mark("embedding_model")),
            );
            Output::kv(
                "nr_retrieved_documents",
                &format!("{}{}", runtime.nr_retrieved_documents, mark("nr_retrieved_documents")),
            );
            Output::kv(
                "use_query_rewriting",
                &format!("{}{}", runtime.use_query_rewriting, mark("use_query_rewriting")),
            );
            Output::kv(
                "system_prompt",
                &format!("{} chars{}", runtime.system_prompt.chars().count(), mark(KEY_SYSTEM_PROMPT)),
            );
            Output::kv(
                "query_rewriting_prompt",
                &format!(
                    "{} chars{}",
                    runtime.query_rewriting_prompt.chars().count(),
                    mark(KEY_QUERY_REWRITING_PROMPT)
                ),
            );
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }

        ConfigAction::Set { key, value } => {
            check_key(key)?;
            store.set(key, value)?;
            // Reject values the runtime cannot use before reporting success.
            if let Err(e) = RuntimeConfig::resolve(&settings, &store) {
                store.remove(key)?;
                return Err(e.into());
            }
            Output::success(&format!("Set {} override", key));
        }

        ConfigAction::Unset { key } => {
            check_key(key)?;
            if store.remove(key)? {
                Output::success(&format!("Removed {} override", key));
            } else {
                Output::info(&format!("No override for {}", key));
            }
        }

        ConfigAction::SetPrompt { kind, file } => {
            let path = PathBuf::from(shellexpand::tilde(file).to_string());
            let prompt = read_prompt_file(&path)?
                .ok_or_else(|| anyhow::anyhow!("Prompt file not found: {}", path.display()))?;
            if prompt.is_empty() {
                anyhow::bail!("Prompt file is empty: {}", path.display());
            }
            let key = match kind {
                PromptKind::System => KEY_SYSTEM_PROMPT,
                PromptKind::QueryRewriting => KEY_QUERY_REWRITING_PROMPT,
            };
            store.set(key, &prompt)?;
            Output::success(&format!("Set {} override from {}", key, path.display()));
        }
    }

    Ok(())
}
