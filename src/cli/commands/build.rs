//! Build command implementation.

use super::runtime_config;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::AifaqError;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the build command.
pub async fn run_build(owner: &str, settings: Settings) -> Result<()> {
    let runtime = runtime_config(&settings)?;
    if let Err(e) = preflight::check(Operation::Build, runtime.provider, &settings.persist_directory()) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings, &runtime)?;

    let spinner = Output::spinner("Building knowledge base...");
    let result = orchestrator.build_knowledge_base(owner).await;
    spinner.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(AifaqError::EmptyCorpus) => {
            Output::warning("No content found in either dataset scope. Nothing was indexed.");
            Output::info("Add files or links under the dataset directories (see 'aifaq init').");
            return Err(AifaqError::EmptyCorpus.into());
        }
        Err(e) => {
            Output::error(&format!("Build failed: {}", e));
            return Err(e.into());
        }
    };

    Output::header("Knowledge base");
    for scope in &report.scopes {
        Output::kv(
            scope.scope.as_str(),
            &format!("{} documents, {} chunks", scope.documents, scope.chunks),
        );
    }
    Output::kv("Sources loaded", &report.succeeded().to_string());
    Output::kv("Index", &report.persist_directory.display().to_string());

    let failed: Vec<_> = report.failed().collect();
    if !failed.is_empty() {
        Output::warning(&format!("{} sources failed and were skipped:", failed.len()));
        for f in failed {
            Output::list_item(&format!("[{}] {}: {}", f.kind, f.locator, f.error));
        }
    }

    Output::success(&format!("Indexed {} chunks (owner: {})", report.entries, report.owner));
    Ok(())
}
