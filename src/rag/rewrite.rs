//! LLM-assisted query rewriting.

use crate::config::Prompts;
use crate::error::{AifaqError, Result};
use crate::llm::ChatModel;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Reformulates user questions to improve retrieval.
pub struct QueryRewriter {
    chat: Arc<dyn ChatModel>,
    prompt: String,
}

impl QueryRewriter {
    /// `prompt` may reference the domain as `{{context}}`.
    pub fn new(chat: Arc<dyn ChatModel>, prompt: &str) -> Self {
        Self {
            chat,
            prompt: prompt.to_string(),
        }
    }

    /// Rewrite `user_query` for the given domain. The query itself is left untouched;
    /// the caller decides which version to search with.
    #[instrument(skip(self), fields(model = %self.chat.model()))]
    pub async fn rewrite(&self, user_query: &str, domain_context: &str) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), domain_context.to_string());
        let system = Prompts::render(&self.prompt, &vars);

        let rewritten = self.chat.complete(&system, user_query).await?;
        if rewritten.trim().is_empty() {
            return Err(AifaqError::ExternalService(
                "Query rewriting returned an empty reply".to_string(),
            ));
        }

        debug!("Rewrote '{}' as '{}'", user_query, rewritten);
        Ok(rewritten)
    }
}
