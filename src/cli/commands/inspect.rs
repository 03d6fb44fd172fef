//! Inspect command implementation.

use crate::cli::output::content_preview;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::index::load_index;
use anyhow::Result;
use console::style;

const SNIPPET_CHARS: usize = 500;

/// Run the inspect command.
pub fn run_inspect(term: Option<&str>, settings: Settings) -> Result<()> {
    let dir = settings.persist_directory();
    preflight::check(Operation::Inspect, settings.llm.provider, &dir)?;

    let index = load_index(&dir, None)?;
    let entries = index.entries_matching(term.unwrap_or(""));

    Output::header("Index");
    Output::kv("Location", &dir.display().to_string());
    Output::kv("Embedding model", index.embedding_model());
    Output::kv("Built", &index.created_at().format("%Y-%m-%d %H:%M:%S UTC").to_string());
    Output::kv("Chunks", &index.len().to_string());

    if let Some(term) = term {
        Output::kv("Matching", &format!("{} for '{}'", entries.len(), term));
    }

    for entry in entries {
        println!("\n{} {}", style(">>").green(), style(&entry.id).dim());
        for (key, value) in &entry.chunk.metadata {
            Output::kv(key, value);
        }
        println!("   {}", content_preview(&entry.chunk.text, SNIPPET_CHARS));
    }

    Ok(())
}
