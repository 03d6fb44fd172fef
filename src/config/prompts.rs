//! Prompt templates for aifaq.
//!
//! Prompts live in plain files referenced from the configuration. A missing
//! file falls back to the built-in text below.

use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Built-in answering prompt. Retrieved context is appended after it.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful assistant answering frequently asked questions.

Guidelines:
- Answer using only the context provided below
- If the context does not contain the answer, say that you don't know
- Be concise; use at most three short paragraphs
- Mention the source of the information when it is relevant"#;

/// Built-in query rewriting prompt.
pub const DEFAULT_QUERY_REWRITING_PROMPT: &str = r#"You rewrite user questions so that they retrieve the most relevant passages from a knowledge base about {{context}}.

Rules:
- Keep the original intent of the question
- Expand abbreviations and add missing domain terms
- Remove greetings and filler words
- Reply with the rewritten question only, without explanations or quotes"#;

/// The two prompts the pipeline uses.
#[derive(Debug, Clone)]
pub struct Prompts {
    /// System prompt for answer generation.
    pub system: String,
    /// System prompt for query rewriting.
    pub query_rewriting: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            query_rewriting: DEFAULT_QUERY_REWRITING_PROMPT.to_string(),
        }
    }
}

impl Prompts {
    /// Load both prompts from their files, using the built-in text for missing files.
    pub fn load(system_path: &Path, query_rewriting_path: &Path) -> crate::error::Result<Self> {
        Ok(Self {
            system: read_prompt_file(system_path)?
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            query_rewriting: read_prompt_file(query_rewriting_path)?
                .unwrap_or_else(|| DEFAULT_QUERY_REWRITING_PROMPT.to_string()),
        })
    }

    /// Write the built-in prompts to the given paths unless the files already exist.
    pub fn write_defaults(system_path: &Path, query_rewriting_path: &Path) -> crate::error::Result<usize> {
        let mut written = 0;
        for (path, content) in [
            (system_path, DEFAULT_SYSTEM_PROMPT),
            (query_rewriting_path, DEFAULT_QUERY_REWRITING_PROMPT),
        ] {
            if path.exists() {
                continue;
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
            written += 1;
        }
        Ok(written)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }
}

/// Read a prompt file, trimming surrounding whitespace. `None` if the file does not exist.
pub fn read_prompt_file(path: &Path) -> crate::error::Result<Option<String>> {
    if !path.exists() {
        debug!("Prompt file {:?} not found, using built-in prompt", path);
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(content.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.system.is_empty());
        assert!(prompts.query_rewriting.contains("{{context}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_load_prefers_files_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("system.md");
        std::fs::write(&system, "  Answer like a pirate.\n").unwrap();

        let prompts = Prompts::load(&system, &dir.path().join("missing.md")).unwrap();
        assert_eq!(prompts.system, "Answer like a pirate.");
        assert_eq!(prompts.query_rewriting, DEFAULT_QUERY_REWRITING_PROMPT);
    }

    #[test]
    fn test_write_defaults_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("prompts/system.md");
        let rewrite = dir.path().join("prompts/rewrite.md");

        assert_eq!(Prompts::write_defaults(&system, &rewrite).unwrap(), 2);
        std::fs::write(&system, "custom").unwrap();
        assert_eq!(Prompts::write_defaults(&system, &rewrite).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&system).unwrap(), "custom");
    }
}
