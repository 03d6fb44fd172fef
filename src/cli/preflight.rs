//! Pre-flight checks before expensive operations.
//!
//! Validates that credentials and a built index are available before starting
//! operations that would otherwise fail midway.

use crate::config::LlmProvider;
use crate::error::{AifaqError, Result};
use crate::index::index_file;
use std::path::Path;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Building embeds every chunk, so it needs an API key.
    Build,
    /// Asking needs an API key and a built index.
    Ask,
    /// Searching embeds the query and needs a built index.
    Search,
    /// Inspecting only reads the index.
    Inspect,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, provider: LlmProvider, persist_directory: &Path) -> Result<()> {
    match operation {
        Operation::Build => {
            check_api_key(provider)?;
        }
        Operation::Ask | Operation::Search => {
            check_api_key(provider)?;
            check_index(persist_directory)?;
        }
        Operation::Inspect => {
            check_index(persist_directory)?;
        }
    }
    Ok(())
}

/// Check that the provider's API key is configured.
fn check_api_key(provider: LlmProvider) -> Result<()> {
    if provider.api_key().is_some() {
        return Ok(());
    }
    let var = provider.api_key_vars().first().copied().unwrap_or("API_KEY");
    Err(AifaqError::Config(format!(
        "{} not set. Set it with: export {}='...'",
        var, var
    )))
}

/// Check that the knowledge base has been built.
fn check_index(persist_directory: &Path) -> Result<()> {
    if index_file(persist_directory).is_file() {
        Ok(())
    } else {
        Err(AifaqError::IndexNotFound(persist_directory.to_path_buf()))
    }
}
