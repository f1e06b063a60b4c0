//! drafthorse: test-time diffusion research from the command line.
//!
//! Usage:
//!   drafthorse "What is HTTP/3?"                # research a query
//!   drafthorse --save "..."                     # also store the run record
//!   DRAFTHORSE_API_KEY=... drafthorse "..."     # provider credentials

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use drafthorse::config::EngineConfig;
use drafthorse::events::TracingSink;
use drafthorse::tools::build_research_registry;
use drafthorse::vault::ResearchVault;
use drafthorse::{SubResearcher, Supervisor};
use drafthorse_llm::{LlmProvider, OpenAiProvider, ProviderConfig};

#[derive(Parser)]
#[command(name = "drafthorse")]
#[command(about = "Test-time diffusion research engine")]
#[command(version)]
struct Cli {
    /// The research query
    query: String,

    /// Model to use
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// OpenAI-compatible chat completions URL override
    #[arg(long)]
    base_url: Option<String>,

    /// Supervisor iteration cap
    #[arg(long, default_value = "15")]
    max_iterations: usize,

    /// Parallel sub-researcher cap
    #[arg(long, default_value = "3")]
    max_concurrent: usize,

    /// Per-topic research loop cap
    #[arg(long, default_value = "5")]
    researcher_iterations: usize,

    /// Search provider: duckduckgo or tavily
    #[arg(long, default_value = "duckduckgo")]
    search_provider: String,

    /// Fetch-and-summarize the top search results inline
    #[arg(long)]
    summarize_sources: bool,

    /// Store the finished run in the local vault
    #[arg(long)]
    save: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let api_key = std::env::var("DRAFTHORSE_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .ok();
    if api_key.is_none() {
        bail!("set DRAFTHORSE_API_KEY or OPENAI_API_KEY");
    }

    let mut config = EngineConfig::default();
    config.max_iterations = cli.max_iterations;
    config.max_concurrent = cli.max_concurrent;
    config.researcher.max_iterations = cli.researcher_iterations;
    config.search.summarize_top_results = cli.summarize_sources;
    let config = config.normalized();

    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(ProviderConfig {
        api_key,
        base_url: cli.base_url,
        model: cli.model,
        ..ProviderConfig::default()
    }));

    let search_api_key = std::env::var("TAVILY_API_KEY").ok();
    let tools = build_research_registry(
        &config,
        &cli.search_provider,
        search_api_key.as_deref(),
    )
    .map_err(anyhow::Error::msg)
    .context("building tool registry")?;

    let events = Arc::new(TracingSink);
    let researcher = Arc::new(SubResearcher::new(
        provider.clone(),
        Arc::new(tools),
        config.researcher.clone(),
        events.clone(),
    ));
    let supervisor = Supervisor::new(provider, researcher, events, config);

    // Ctrl-C cancels the run cooperatively.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling research run");
            signal_cancel.cancel();
        }
    });

    let record = supervisor
        .coordinate(&cli.query, cancel)
        .await
        .context("research run failed")?;

    println!("{}", record.final_report);

    if cli.save {
        let vault = ResearchVault::open_default()?;
        let path = vault.store(&record)?;
        eprintln!("run stored at {}", path.display());
    }

    Ok(())
}
