use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::semantic::RankParams;

#[derive(Parser, Debug)]
#[command(version, about = "Semantic search over activity opportunities", long_about = None)]
pub struct Args {
    /// Corpus file (JSON array of opportunities with embeddings).
    /// Overrides `corpus_path` from config.yaml
    #[clap(long, global = true)]
    pub corpus: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Per-invocation overrides of the ranking defaults.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RankArgs {
    /// Maximum number of results
    #[clap(short = 'l', long)]
    pub limit: Option<usize>,

    /// Results to show even when too few pass the threshold
    #[clap(short = 'm', long)]
    pub min_results: Option<usize>,

    /// Similarity threshold between -1.0 and 1.0
    #[clap(short = 't', long, allow_hyphen_values = true)]
    pub threshold: Option<f32>,
}

impl RankArgs {
    /// Apply the flags that were given on top of `defaults`.
    pub fn apply(&self, defaults: RankParams) -> RankParams {
        defaults.with_overrides(self.limit, self.min_results, self.threshold)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate cli docs in markdown format
    #[cfg(feature = "markdown-docs")]
    #[clap(hide = true)]
    MarkdownDocs {},

    /// Run a single search
    Search {
        /// Search query
        query: String,

        /// Print results as JSON
        #[clap(long, default_value = "false")]
        json: bool,

        #[clap(flatten)]
        rank_args: RankArgs,
    },
    /// Search interactively
    Interactive {
        #[clap(flatten)]
        rank_args: RankArgs,
    },
    /// Start the HTTP search API
    Serve {
        /// Address to listen on. Overrides `server.addr` from config.yaml
        #[clap(long)]
        addr: Option<String>,
    },
    /// Print the effective configuration
    Config {},
}
