use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use limelight_common::{
    config::{config_fingerprint, load_text_list, load_toml},
    Config, DailyWindow, RunStatus, SourcesConfig, WeightsConfig,
};
use limelight_ingest::{GdeltAdapter, QuotaLedger, RedditAdapter, SourceAdapter, YoutubeAdapter};
use limelight_nlp::{
    Capabilities, LexiconSentiment, RemoteEmbedder, RemoteSentiment, SentimentScorer, TextEmbedder,
    ThemeBuilder,
};
use limelight_pipeline::baseline::{
    BaselineJob, HttpTrends, NoopTrends, TrendsSource, WikipediaPageviews,
};
use limelight_pipeline::{DailyRun, PipelineDeps};
use limelight_store::Store;

#[derive(Parser)]
#[command(name = "limelight", about = "Daily fame/love heatmap pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute the daily pipeline for one window.
    Run {
        /// Window start date (local operator date, window runs 6am→6am).
        /// Defaults to the window ending at the most recent boundary.
        #[arg(long)]
        window_start: Option<NaiveDate>,
    },
    /// Recompute the weekly baseline for the active catalog.
    Baseline,
    /// Sync pinned entities from config/pinned_entities.json into the store.
    SyncCatalog,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("limelight=info".parse().unwrap()),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(64);
        }
    };

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config = Config::from_env()?;
    config.log_redacted();

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
    let store = Store::connect(&config.database_url)
        .await
        .context("store connection failed")?;

    match cli.command {
        Command::Run { window_start } => run_pipeline(config, store, window_start).await,
        Command::Baseline => run_baseline(config, store).await,
        Command::SyncCatalog => {
            let path = config.config_dir.join("pinned_entities.json");
            let count = limelight_catalog::sync_pinned_entities(&store, &path).await?;
            info!(count, "Catalog sync complete");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_pipeline(
    config: Config,
    store: Store,
    window_start: Option<NaiveDate>,
) -> Result<ExitCode> {
    let sources: SourcesConfig = load_toml(&config.config_dir.join("sources.toml"))?;
    let weights: WeightsConfig = load_toml(&config.config_dir.join("weights.toml"))?;
    let fingerprint = config_fingerprint(&sources, &weights);

    let window = match window_start {
        Some(date) => DailyWindow::starting_on(date.year(), date.month(), date.day(), config.window_tz)?,
        None => DailyWindow::latest(Utc::now(), config.window_tz)?,
    };

    let adapters = build_adapters(&config, &sources)?;
    if adapters.is_empty() {
        warn!("No sources enabled; the window will be empty");
    }

    let caps = Capabilities::probe(
        config.sentiment_endpoint.as_deref(),
        &config.embedding_api_key,
    )
    .await;
    let sentiment: Box<dyn SentimentScorer> = match (&config.sentiment_endpoint, caps.transformer_sentiment) {
        (Some(endpoint), true) => Box::new(RemoteSentiment::new(endpoint.clone())),
        _ => Box::new(LexiconSentiment),
    };
    let embedder: Option<Box<dyn TextEmbedder>> = if caps.embedding_themes {
        Some(Box::new(RemoteEmbedder::new(&config.embedding_api_key)))
    } else {
        None
    };
    let themes = ThemeBuilder::new(embedder, weights.theme_count);

    let cancelled = Arc::new(AtomicBool::new(false));
    let cancel_flag = cancelled.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing current stage then stopping");
            cancel_flag.store(true, Ordering::Relaxed);
        }
    });

    let runner = DailyRun::new(PipelineDeps {
        store,
        adapters,
        sentiment,
        themes,
        weights,
        config_fingerprint: fingerprint,
        workers: config.workers,
        data_dir: config.data_dir.clone(),
        cancelled,
    });
    let outcome = runner.execute(window).await?;
    info!(
        run_id = %outcome.run_id,
        status = outcome.status.as_str(),
        entities = outcome.entities,
        "Pipeline finished"
    );

    Ok(match outcome.status {
        RunStatus::Success => ExitCode::SUCCESS,
        RunStatus::Partial => ExitCode::from(2),
        _ => ExitCode::from(1),
    })
}

async fn run_baseline(config: Config, store: Store) -> Result<ExitCode> {
    let catalog = limelight_catalog::load_catalog(&store).await?;
    let trends: Box<dyn TrendsSource> = match std::env::var("TRENDS_ENDPOINT") {
        Ok(endpoint) => Box::new(HttpTrends::new(endpoint)),
        Err(_) => Box::new(NoopTrends),
    };
    let pageviews = WikipediaPageviews::new("limelight/0.3 (ops@limelight.dev)");
    let job = BaselineJob {
        store: &store,
        trends: trends.as_ref(),
        pageviews: &pageviews,
    };
    let rows = job.run(&catalog, Utc::now()).await?;
    info!(rows, "Baseline job complete");
    Ok(ExitCode::SUCCESS)
}

fn build_adapters(
    config: &Config,
    sources: &SourcesConfig,
) -> Result<Vec<Box<dyn SourceAdapter>>> {
    let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();

    if sources.reddit.enabled {
        let subreddits = load_text_list(&resolve(config, &sources.reddit.subreddits_file))?;
        adapters.push(Box::new(RedditAdapter::new(
            config.reddit_client_id.clone(),
            config.reddit_client_secret.clone(),
            config.reddit_user_agent.clone(),
            subreddits,
            sources.reddit.max_posts_per_subreddit,
            sources.reddit.max_comments_per_post,
        )?));
    }

    if sources.youtube.enabled {
        let ledger = Arc::new(QuotaLedger::open(
            &config.data_dir.join("youtube_quota.json"),
            sources.youtube.daily_quota_units,
        )?);
        adapters.push(Box::new(YoutubeAdapter::new(
            config.youtube_api_key.clone(),
            sources.youtube.channels.clone(),
            sources.youtube.fetch_comments,
            sources.youtube.max_comments_per_video,
            ledger,
        )?));
    }

    if sources.gdelt.enabled {
        let allowlist = load_text_list(&resolve(config, &sources.gdelt.allowlist_file))?;
        adapters.push(Box::new(GdeltAdapter::new(
            sources.gdelt.keywords.clone(),
            allowlist,
            sources.gdelt.max_articles,
        )?));
    }

    Ok(adapters)
}

/// Paths in sources.toml are relative to the config dir's parent, so the
/// shipped defaults ("config/subreddits.txt") work from the repo root.
fn resolve(config: &Config, path: &std::path::Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config
            .config_dir
            .parent()
            .unwrap_or(&config.config_dir)
            .join(path)
    }
}
