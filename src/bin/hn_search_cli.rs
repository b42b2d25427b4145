//! Command-line client for the bio search service.
//!
//! ```bash
//! # LLM-expanded search, second page of merged results
//! hn-search-cli search "Backend engineer into Rust and databases" --page 2
//!
//! # Direct search, no LLM
//! hn-search-cli search --no-llm -k 50 "Backend engineer"
//!
//! # Build the in-memory index from a JSONL dump of stories
//! hn-search-cli ingest stories.jsonl
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use hn_search::client::{SearchClient, TerminalRenderer};
use hn_search::config::Config;
use hn_search::index::ingest::{ingest_stories, read_stories_jsonl};
use hn_search::index::memory::MemoryIndex;
use hn_search::llm::embeddings::HttpEmbedder;

#[derive(Parser)]
#[command(name = "hn-search-cli", version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find stories relevant to a bio
    Search {
        /// Free-text bio
        bio: String,

        /// Skip LLM expansion and search the bio directly
        #[arg(long)]
        no_llm: bool,

        /// Total result budget (server default when omitted)
        #[arg(short)]
        k: Option<usize>,

        /// Results page to show (20 per page)
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Search service base URL
        #[arg(long, env = "HN_SEARCH_URL", default_value = "http://127.0.0.1:8000")]
        server: String,
    },
    /// Embed stories from a JSONL file into the in-memory index
    Ingest {
        /// One `{"title", "url", "hn_id"?}` object per line
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Search {
            bio,
            no_llm,
            k,
            page,
            server,
        } => search(&server, &bio, no_llm, k, page).await,
        Command::Ingest { path } => ingest(&path).await,
    }
}

async fn search(
    server: &str,
    bio: &str,
    no_llm: bool,
    k: Option<usize>,
    page: usize,
) -> Result<()> {
    let client = SearchClient::new(server)?;
    let mut renderer = TerminalRenderer::new(std::io::stdout());

    let outcome = if no_llm {
        client.search_direct(bio, k, &mut renderer).await?
    } else {
        client.search_expanded(bio, k, &mut renderer).await?
    };

    renderer.render_page(&outcome, page.max(1))?;
    Ok(())
}

async fn ingest(path: &Path) -> Result<()> {
    let config = Config::from_env();
    let stories = read_stories_jsonl(path)?;
    if stories.is_empty() {
        anyhow::bail!("No stories found in {}", path.display());
    }

    let http = reqwest::Client::new();
    let embedder = HttpEmbedder::new(http, config.embedding.clone());
    let index = MemoryIndex::open_or_create(&config.stories_path())?;

    let added = ingest_stories(&embedder, &index, &stories).await?;
    println!(
        "Indexed {added} stories into {} ({} total)",
        config.stories_path().display(),
        index.entry_count()
    );
    Ok(())
}
