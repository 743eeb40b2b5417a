use anyhow::Context;
use clap::Parser;
use inquire::error::InquireError;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod format;
mod opportunity;
mod semantic;
#[cfg(test)]
mod tests;
mod web;

use cli::{Command, RankArgs};
use config::Config;
use semantic::{CorpusSource, JsonCorpus, RankParams, SearchError, SearchService};

fn init_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load the corpus and the query vectorizer described by `config`.
fn build_service(
    config: &Config,
    corpus_override: Option<std::path::PathBuf>,
) -> anyhow::Result<SearchService> {
    let corpus_path = corpus_override.unwrap_or_else(|| config.corpus_path());
    let corpus = JsonCorpus::new(&corpus_path)
        .load()
        .context("failed to load opportunities")?;

    let vectorizer = semantic::embeddings::from_config(&config.embedding, config.base_path())
        .context("failed to set up query embeddings")?;

    Ok(SearchService::new(vectorizer, corpus, config.search.rank_params()))
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    let quiet = matches!(args.command, Command::Search { json: true, .. });
    init_logging(if quiet { "warn" } else { "info" });

    let config = Config::load().context("failed to load config")?;

    match args.command {
        #[cfg(feature = "markdown-docs")]
        Command::MarkdownDocs {} => {
            clap_markdown::print_help_markdown::<cli::Args>();
            Ok(())
        }

        Command::Config {} => {
            println!("# {}", config.base_path().join("config.yaml").display());
            print!("{}", serde_yml::to_string(&config)?);
            Ok(())
        }

        Command::Search {
            query,
            json,
            rank_args,
        } => {
            let service = build_service(&config, args.corpus)?;
            let params = rank_args.apply(service.defaults());

            print!("{}", search_output(&service, &query, params, json)?);
            Ok(())
        }

        Command::Interactive { rank_args } => {
            let service = build_service(&config, args.corpus)?;
            interactive(&service, &rank_args)
        }

        Command::Serve { addr } => {
            let service = build_service(&config, args.corpus)?;
            let addr = addr.unwrap_or_else(|| config.server.addr.clone());
            web::start_daemon(service, &addr)
        }
    }
}

/// Run one search and render it for stdout, as a JSON array or as text.
///
/// A search that ran and matched nothing renders normally (`[]` in JSON
/// mode). A query that could not be vectorized is an error, so the caller
/// reports it on stderr and exits non-zero.
fn search_output(
    service: &SearchService,
    query: &str,
    params: RankParams,
    json: bool,
) -> anyhow::Result<String> {
    match service.search(query, Some(params)) {
        Ok(report) if json => Ok(format!(
            "{}\n",
            serde_json::to_string(&format::results_json(&report))?
        )),
        Ok(report) => Ok(format::format_report(&report)),
        Err(err @ SearchError::Unavailable(_)) => {
            Err(anyhow::Error::new(err).context("no search was performed"))
        }
        Err(err) => Err(err.into()),
    }
}

fn interactive(service: &SearchService, rank_args: &RankArgs) -> anyhow::Result<()> {
    let params = rank_args.apply(service.defaults());

    println!(
        "\nVector search ready! Loaded {} opportunities.",
        service.corpus_len()
    );
    println!("Try queries like:");
    println!("   - 'art classes for kids'");
    println!("   - 'swimming lessons for adults'");
    println!("   - 'free programs for teenagers'");
    println!("   - 'STEM activities for ages 8-12'");
    println!("\nType 'quit' to exit.\n");

    loop {
        let query = match inquire::Text::new("Enter your search query:").prompt() {
            Ok(query) => query,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(err.into()),
        };
        let query = query.trim();

        if matches!(query.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        match service.search(query, Some(params)) {
            Ok(report) => print!("{}", format::format_report(&report)),
            Err(SearchError::EmptyQuery) => println!("Please enter a search query."),
            Err(err @ SearchError::Unavailable(_)) => {
                println!("Search unavailable, no search was performed: {err}")
            }
            Err(err) => return Err(err.into()),
        }
    }

    println!("Goodbye!");
    Ok(())
}
