//! Debug and ops CLI for the feed reconciliation engine.
//!
//! Imports run against the in-memory reference store, which makes this a
//! harness for exercising feeds and schedules — wire a real store
//! implementation for production use.

use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::EnvFilter;

use feedsync_core::{load_app_config_from_env, load_feeds, AppConfig, FeedConfig, FeedKind, Frequency};
use feedsync_engine::bootstrap::ensure_reference_data;
use feedsync_engine::{run_import, run_scheduled, validate_feed, FeedStates, LogNotifier, Summary};
use feedsync_feed::FeedClient;
use feedsync_store::MemoryStore;

#[derive(Debug, Parser)]
#[command(name = "feedsync")]
#[command(about = "Supplier XML feed reconciliation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Items,
    Orders,
}

impl From<KindArg> for FeedKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Items => FeedKind::Items,
            KindArg::Orders => FeedKind::Orders,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Import one feed and print the run summary.
    Import {
        /// Feed URL or local file path.
        #[arg(long)]
        source: String,
        #[arg(long, value_enum, default_value = "items")]
        kind: KindArg,
        /// Company assigned to imported records.
        #[arg(long)]
        company: Option<String>,
        /// Fetch, parse, and extract without writing anything.
        #[arg(long)]
        dry_run: bool,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Fetch and parse a feed, reporting what an import would see.
    Validate {
        source: String,
        #[arg(long, value_enum, default_value = "items")]
        kind: KindArg,
    },
    /// Run the configured feeds on their schedules until interrupted.
    Schedule,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = load_app_config_from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Import {
            source,
            kind,
            company,
            dry_run,
            json,
        } => import(&config, &source, kind.into(), company, dry_run, json).await,
        Commands::Validate { source, kind } => validate(&config, &source, kind.into()).await,
        Commands::Schedule => schedule(config).await,
    }
}

fn build_client(config: &AppConfig) -> anyhow::Result<FeedClient> {
    Ok(FeedClient::new(
        config.fetch_timeout_secs,
        config.probe_timeout_secs,
        &config.user_agent,
    )?)
}

fn ad_hoc_feed(source: &str, kind: FeedKind, company: Option<String>) -> FeedConfig {
    FeedConfig {
        name: "cli".to_string(),
        enabled: true,
        kind,
        source_url: source.to_string(),
        company,
        frequency: Frequency::Hourly,
        check_feed_changes: false,
        auto_submit_orders: false,
        download_images: false,
        update_stock: true,
        notification_recipients: vec![],
    }
}

async fn import(
    config: &AppConfig,
    source: &str,
    kind: FeedKind,
    company: Option<String>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let mut store = MemoryStore::new();
    ensure_reference_data(&mut store);

    let feed = ad_hoc_feed(source, kind, company);
    let summary = run_import(&client, &mut store, &feed, &config.default_company, dry_run).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if summary.success {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn print_summary(summary: &Summary) {
    println!("Import {}", if summary.success { "succeeded" } else { "failed" });
    println!("  created: {}", summary.created);
    println!("  updated: {}", summary.updated);
    println!("  skipped: {}", summary.skipped);
    println!("  errors:  {}", summary.errors);
    println!("  total:   {}", summary.total);
    if let Some(failure) = &summary.failure {
        println!("  failure: {failure}");
    }
    if !summary.error_messages.is_empty() {
        println!("First errors:");
        for message in &summary.error_messages {
            println!("  - {message}");
        }
    }
}

async fn validate(config: &AppConfig, source: &str, kind: FeedKind) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let validation = validate_feed(&client, source, kind).await?;

    println!("Root element: {}", validation.root_tag);
    println!("Records found: {}", validation.total);
    if let Some(sample) = validation.sample {
        println!("First record: {} — {} ({})", sample.key, sample.name, sample.detail);
    }
    Ok(())
}

struct SchedulerState {
    store: MemoryStore,
    states: FeedStates,
}

async fn schedule(config: AppConfig) -> anyhow::Result<()> {
    let feeds = load_feeds(&config.feeds_path)?.feeds;
    let enabled = feeds.iter().filter(|f| f.enabled).count();
    tracing::info!(
        feeds = feeds.len(),
        enabled,
        "starting scheduler; ticking every minute"
    );

    let client = Arc::new(build_client(&config)?);
    let feeds = Arc::new(feeds);
    let default_company = Arc::new(config.default_company.clone());

    let mut store = MemoryStore::new();
    ensure_reference_data(&mut store);
    let state = Arc::new(tokio::sync::Mutex::new(SchedulerState {
        store,
        states: FeedStates::new(),
    }));

    let scheduler = JobScheduler::new().await?;
    let job = Job::new_async("0 * * * * *", move |_uuid, _lock| {
        let client = Arc::clone(&client);
        let feeds = Arc::clone(&feeds);
        let default_company = Arc::clone(&default_company);
        let state = Arc::clone(&state);

        Box::pin(async move {
            let mut guard = state.lock().await;
            let SchedulerState { store, states } = &mut *guard;
            run_scheduled(
                &client,
                store,
                &feeds,
                states,
                &LogNotifier,
                &default_company,
                Utc::now(),
            )
            .await;
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;

    // The scheduler handle must stay alive; dropping it stops all jobs.
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down scheduler");
    Ok(())
}
