//! Search command implementation.

use super::{answer_pipeline, runtime_config};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::{AnswerConfig, Role};
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, role: Role, limit: Option<usize>, settings: Settings) -> Result<()> {
    let runtime = runtime_config(&settings)?;
    preflight::check(Operation::Search, runtime.provider, &settings.persist_directory())?;

    let mut config = AnswerConfig::from(&runtime);
    if let Some(limit) = limit {
        config.k = limit.max(1);
    }
    let pipeline = answer_pipeline(&settings, &runtime, config)?;

    let spinner = Output::spinner("Searching...");
    let results = pipeline.retrieve(query, role).await;
    spinner.finish_and_clear();

    match results {
        Ok(results) => {
            if results.is_empty() {
                Output::warning(&format!("No content visible to the {} role matches your query.", role));
            } else {
                Output::success(&format!("Found {} results", results.len()));

                for result in &results {
                    Output::search_result(
                        &result.chunk.label(),
                        result.chunk.access().unwrap_or("?"),
                        result.score,
                        &result.chunk.text,
                    );
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
