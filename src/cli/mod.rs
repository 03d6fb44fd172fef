//! CLI module for aifaq.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::rag::Role;
use clap::{Parser, Subcommand, ValueEnum};

/// aifaq - answers questions from your own documents
///
/// Builds a searchable knowledge base from web pages, YouTube transcripts,
/// PDF, HTML and text files, and answers questions grounded in it.
#[derive(Parser, Debug)]
#[command(name = "aifaq")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "AIFAQ_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the dataset layout, default prompts and configuration
    Init,

    /// Build the knowledge base from both dataset scopes
    Build {
        /// Identity recorded as the owner of every indexed chunk
        #[arg(short, long, default_value = "admin")]
        owner: String,
    },

    /// Ask a question and get an answer grounded in the knowledge base
    Ask {
        /// The question to ask
        question: String,

        /// Privilege of the caller (guest only sees public content)
        #[arg(short, long, default_value = "guest")]
        role: Role,

        /// Search with the question as typed, even if rewriting is enabled
        #[arg(long)]
        no_rewrite: bool,
    },

    /// Retrieve the chunks a question would be answered from
    Search {
        /// Search query
        query: String,

        /// Privilege of the caller (guest only sees public content)
        #[arg(short, long, default_value = "guest")]
        role: Role,

        /// Maximum number of results (defaults to nr_retrieved_documents)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List stored chunks, optionally only those containing every term
    Inspect {
        /// Whitespace-separated terms matched against text and metadata
        term: Option<String>,
    },

    /// Manage configuration and persisted overrides
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Which prompt an override replaces.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptKind {
    System,
    QueryRewriting,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the configuration file and the resolved runtime values
    Show,

    /// Show configuration file path
    Path,

    /// Persist an override (e.g. "model_name", "nr_retrieved_documents")
    Set {
        /// Override key
        key: String,
        /// Override value
        value: String,
    },

    /// Remove a persisted override
    Unset {
        /// Override key
        key: String,
    },

    /// Persist a prompt override from a file
    SetPrompt {
        /// Prompt to replace
        #[arg(value_enum)]
        kind: PromptKind,
        /// File holding the new prompt text
        file: String,
    },
}
