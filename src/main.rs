//! aifaq CLI entry point.

use aifaq::cli::{commands, Cli, Commands};
use aifaq::config::Settings;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("aifaq={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config_path = cli
        .config
        .as_deref()
        .map(Settings::expand_path)
        .unwrap_or_else(Settings::default_config_path);
    let settings = Settings::load_from(Some(&config_path))?;

    // Execute command
    match &cli.command {
        Commands::Init => {
            commands::run_init(&settings, &config_path)?;
        }

        Commands::Build { owner } => {
            commands::run_build(owner, settings).await?;
        }

        Commands::Ask {
            question,
            role,
            no_rewrite,
        } => {
            commands::run_ask(question, *role, *no_rewrite, settings).await?;
        }

        Commands::Search { query, role, limit } => {
            commands::run_search(query, *role, *limit, settings).await?;
        }

        Commands::Inspect { term } => {
            commands::run_inspect(term.as_deref(), settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, &config_path)?;
        }
    }

    Ok(())
}
