//! Init command: create the dataset layout, prompt files and configuration.

use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::sources::{transcripts_dir, AccessScope};
use console::style;
use std::path::{Path, PathBuf};

/// Sub-directories created below each scope root.
fn scope_dirs(settings: &Settings, root: &Path) -> Vec<PathBuf> {
    let dataset = &settings.dataset;
    let yt = root.join(&dataset.yt_video_links);
    let transcripts = transcripts_dir(&yt);

    vec![
        root.join(&dataset.web_urls),
        yt,
        transcripts,
        root.join(&dataset.text_files),
        root.join(&dataset.pdf_files),
        root.join(&dataset.rtdocs_files),
        root.join(&dataset.html_files),
    ]
}

/// Create every directory the pipeline reads from. Returns the ones created.
pub(crate) fn create_layout(settings: &Settings) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = AccessScope::ALL
        .iter()
        .flat_map(|scope| scope_dirs(settings, &settings.scope_root(*scope)))
        .collect();
    dirs.push(settings.persist_directory());

    let mut created = Vec::new();
    for dir in dirs {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            created.push(dir);
        }
    }
    Ok(created)
}

/// Run the init command for first-time setup.
pub fn run_init(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("aifaq setup");

    println!("\n{}", style("Dataset directories").bold().cyan());
    let created = create_layout(settings)?;
    if created.is_empty() {
        Output::info("All directories already exist.");
    }
    for dir in &created {
        Output::success(&format!("Created {}", dir.display()));
    }

    println!("\n{}", style("Prompts").bold().cyan());
    let written = Prompts::write_defaults(
        &Settings::expand_path(&settings.prompts.system_prompt),
        &Settings::expand_path(&settings.prompts.query_rewriting_prompt),
    )?;
    if written > 0 {
        Output::success(&format!("Wrote {} default prompt file(s)", written));
    } else {
        Output::info("Prompt files exist.");
    }

    println!("\n{}", style("Configuration").bold().cyan());
    if config_path.exists() {
        Output::info(&format!("Config file exists: {}", config_path.display()));
    } else {
        settings.save_to(config_path)?;
        Output::success(&format!("Created config file: {}", config_path.display()));
    }

    let provider = settings.llm.provider;
    if provider.api_key().is_none() {
        let var = provider.api_key_vars().first().copied().unwrap_or("API_KEY");
        println!();
        Output::warning(&format!("{} is not set; 'build' and 'ask' need it.", var));
    }

    println!();
    println!("Next steps:");
    println!("  {} Add links and files under the dataset directories", style("1.").cyan());
    println!("  {} Build the knowledge base", style("aifaq build").cyan());
    println!("  {} Ask a question", style("aifaq ask \"<question>\"").cyan());

    Ok(())
}
