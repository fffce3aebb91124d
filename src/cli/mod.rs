//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sift",
    version,
    author = "neur0map",
    about = "Two-stage document retrieval: dense vector search followed by cross-encoder reranking",
    long_about = "Sift indexes a document collection with a bi-encoder, fetches nearest neighbours for each \
                  query from the vector index, and reorders them with a cross-encoder. It runs one-shot from \
                  the command line or as a long-lived server on a Unix socket."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/sift/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply (e.g., "offline", "fast", "accuracy")
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index the corpus and serve queries on the configured socket
    Serve {
        /// Corpus file (overrides corpus.path)
        #[arg(long, value_name = "PATH")]
        corpus: Option<PathBuf>,

        /// Socket path (overrides server.socket_path)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Index the corpus in-process and run a single query
    Search {
        /// Search query text
        query: String,

        #[command(flatten)]
        limits: QueryLimits,

        /// Corpus file (overrides corpus.path)
        #[arg(long, value_name = "PATH")]
        corpus: Option<PathBuf>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Send a query to a running server
    Query {
        /// Search query text
        query: String,

        #[command(flatten)]
        limits: QueryLimits,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show status of a running server
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Result and candidate counts for one query
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct QueryLimits {
    /// Number of results to return (defaults to retrieval.default_top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Number of candidates to rerank (defaults to retrieval.default_initial_k)
    #[arg(short = 'n', long)]
    pub initial_k: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
