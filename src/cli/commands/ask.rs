//! Ask command implementation.

use super::{answer_pipeline, runtime_config};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::{AnswerConfig, Role};
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, role: Role, no_rewrite: bool, settings: Settings) -> Result<()> {
    let runtime = runtime_config(&settings)?;

    if let Err(e) = preflight::check(Operation::Ask, runtime.provider, &settings.persist_directory()) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let mut config = AnswerConfig::from(&runtime);
    if no_rewrite {
        config.use_query_rewriting = false;
    }
    let pipeline = answer_pipeline(&settings, &runtime, config)?;

    let spinner = Output::spinner("Searching knowledge base...");

    match pipeline.answer(question, role).await {
        Ok(answer) => {
            spinner.finish_and_clear();

            if let Some(rewritten) = &answer.rewritten_query {
                Output::kv("Searched for", rewritten);
            }

            println!("\n{}\n", answer.answer);

            if !answer.sources.is_empty() {
                Output::header("Sources");
                for source in &answer.sources {
                    Output::search_result(
                        &source.chunk.label(),
                        source.chunk.access().unwrap_or("?"),
                        source.score,
                        &source.chunk.text,
                    );
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
