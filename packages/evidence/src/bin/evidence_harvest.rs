//! Evidence harvest CLI
//!
//! Harvests competitor evidence into the artifact store and prints the
//! resulting assessment as JSON.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evidence::{
    fetch_all, harvest_and_store, latest_assessment, select_shortlist, triage_pages,
    ArtifactStore, EvidenceCache, HarvestContext, HttpExtractor, OpenAiSummarizer,
    PipelineConfig, SecretString, TavilyWebSearcher,
};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Parser)]
#[command(name = "evidence-harvest")]
#[command(about = "Harvest and assess public evidence about a competitor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest a new evidence bundle and print its assessment
    Harvest {
        #[arg(long)]
        company: String,
        /// Competitor's own domain
        #[arg(long)]
        domain: Option<String>,
        /// Free-text qualifier added to queries
        #[arg(long)]
        context: Option<String>,
        /// Sources kept per category
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value = "default")]
        project: String,
    },

    /// Re-assess the latest stored bundle
    Assess {
        #[arg(long, default_value = "default")]
        project: String,
        /// Competitor domains for first-party scoring
        #[arg(long = "domain")]
        domains: Vec<String>,
    },

    /// Fetch and triage pages, then print the deep-read shortlist
    Shortlist {
        #[arg(long = "url", required = true)]
        urls: Vec<String>,
    },
}

/// Runtime settings loaded from environment variables.
struct Settings {
    tavily_api_key: Option<SecretString>,
    openai_api_key: Option<SecretString>,
    openai_model: String,
    database_url: Option<String>,
}

impl Settings {
    fn from_env() -> Self {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        Self {
            tavily_api_key: SecretString::from_env("TAVILY_API_KEY"),
            openai_api_key: SecretString::from_env("OPENAI_API_KEY"),
            openai_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
            database_url: env::var("EVIDENCE_DATABASE_URL").ok().filter(|u| !u.is_empty()),
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}

async fn run<St>(command: Commands, settings: Settings, store: St) -> Result<()>
where
    St: ArtifactStore + EvidenceCache,
{
    let config = PipelineConfig::default();
    let now = Utc::now();

    match command {
        Commands::Harvest {
            company,
            domain,
            context,
            limit,
            project,
        } => {
            let api_key = settings
                .tavily_api_key
                .context("TAVILY_API_KEY must be set")?;
            let searcher = TavilyWebSearcher::new(api_key);

            let mut ctx = HarvestContext::new(company);
            if let Some(domain) = domain {
                ctx = ctx.with_domain(domain);
            }
            if let Some(context) = context {
                ctx = ctx.with_context(context);
            }
            if let Some(limit) = limit {
                ctx = ctx.with_limit_per_category(limit);
            }

            harvest_and_store(&project, &ctx, &searcher, &store, &config, now)
                .await
                .context("failed to store evidence bundle")?;
            let domains: Vec<String> = ctx.domain().into_iter().collect();
            let assessment = latest_assessment(&project, &store, &domains, &config, now).await?;
            print_json(&assessment)
        }
        Commands::Assess { project, domains } => {
            let assessment = latest_assessment(&project, &store, &domains, &config, now)
                .await
                .context("failed to load evidence bundle")?;
            print_json(&assessment)
        }
        Commands::Shortlist { urls } => {
            let api_key = settings
                .openai_api_key
                .context("OPENAI_API_KEY must be set")?;
            let summarizer = OpenAiSummarizer::new(api_key, settings.openai_model);
            let extractor = HttpExtractor::new().context("failed to build HTTP client")?;

            let fetch = fetch_all(&urls, &extractor, &store, &config.fetch, now).await;
            let pages: Vec<_> = fetch.pages().cloned().collect();
            let triage = triage_pages(&pages, &summarizer, &store, &config.triage).await;
            let shortlist = select_shortlist(&triage.records, &config.shortlist);
            print_json(&shortlist)
        }
    }
}

#[cfg(feature = "sqlite")]
async fn dispatch(command: Commands, settings: Settings) -> Result<()> {
    if let Some(url) = settings.database_url.clone() {
        tracing::info!("Using SQLite store");
        let store = evidence::SqliteStore::new(&url)
            .await
            .context("failed to open evidence database")?;
        return run(command, settings, store).await;
    }
    run(command, settings, evidence::MemoryStore::new()).await
}

#[cfg(not(feature = "sqlite"))]
async fn dispatch(command: Commands, settings: Settings) -> Result<()> {
    if settings.database_url.is_some() {
        tracing::warn!("EVIDENCE_DATABASE_URL is set but the sqlite feature is disabled; using memory store");
    }
    run(command, settings, evidence::MemoryStore::new()).await
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,evidence=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    dispatch(cli.command, settings).await
}
