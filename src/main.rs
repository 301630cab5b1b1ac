use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use events_crawler::crawling::{CrawlOrchestrator, EventDetailExtractor, LinkDiscoverer, OrchestratorConfig};
use events_crawler::domain::calendar::parse_listing_date;
use events_crawler::domain::{DateWindow, EventRepository};
use events_crawler::infrastructure::config::{AppConfig, DatabaseBackend};
use events_crawler::infrastructure::{
    DatabaseConnection, HttpPageFetcher, JsonEventExport, JsonSeenLinkStore, PageFetcher,
    PostgresEventRepository, SqliteEventRepository, init_logging_with_config,
};

#[derive(Parser)]
#[command(name = "events-crawler")]
#[command(version, about = "Crawl the events calendar into a database")]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(long, env = "EVENTS_CRAWLER_CONFIG")]
    config: Option<PathBuf>,

    /// Number of days to crawl
    #[arg(long)]
    days: Option<u32>,

    /// First day to crawl as YYYYMMDD; defaults to today
    #[arg(long, value_parser = parse_start_date)]
    start_date: Option<NaiveDate>,

    /// Only process the first N links of each day
    #[arg(long)]
    max_links_per_day: Option<usize>,

    /// Detail pages extracted at the same time
    #[arg(long)]
    concurrency: Option<usize>,
}

fn parse_start_date(raw: &str) -> Result<NaiveDate, String> {
    parse_listing_date(raw).ok_or_else(|| format!("'{raw}' is not a YYYYMMDD date"))
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(days) = self.days {
            config.crawler.lookahead_days = days;
        }
        if let Some(limit) = self.max_links_per_day {
            config.crawler.max_links_per_day = Some(limit);
        }
        if let Some(concurrency) = self.concurrency {
            config.crawler.max_concurrent_extractions = concurrency;
        }
    }
}

async fn open_repository(config: &AppConfig) -> Result<Arc<dyn EventRepository>> {
    match config.database.backend {
        DatabaseBackend::Sqlite => {
            let db = DatabaseConnection::with_max_connections(&config.database.url, config.database.max_connections)
                .await?;
            db.migrate().await?;
            info!("Using SQLite database {}", config.database.url);
            Ok(Arc::new(SqliteEventRepository::new(db.pool().clone())))
        }
        DatabaseBackend::Postgres => {
            let repository = PostgresEventRepository::connect(&config.database).await?;
            repository.migrate().await?;
            Ok(Arc::new(repository))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    init_logging_with_config(config.logging.clone())?;
    info!("events-crawler {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &cli.config {
        info!("Loaded configuration file: {:?}", path);
    }

    let repository = open_repository(&config).await?;

    let render_timeout = Duration::from_millis(config.crawler.render_timeout_ms);
    let poll_interval = Duration::from_millis(config.crawler.render_poll_interval_ms);
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::from_config(&config.fetcher, poll_interval)?);

    let discoverer = LinkDiscoverer::new(Arc::clone(&fetcher), &config.site.base_url, render_timeout)?;
    let extractor = EventDetailExtractor::new(fetcher, render_timeout);
    let seen_store = Arc::new(JsonSeenLinkStore::new(config.checkpoint.path.clone()));

    let mut orchestrator = CrawlOrchestrator::new(
        discoverer,
        extractor,
        repository,
        seen_store,
        OrchestratorConfig::from_crawler_config(&config.crawler),
    );
    if let Some(path) = &config.export.path {
        orchestrator = orchestrator.with_export(JsonEventExport::new(path.clone()));
    }

    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight links before stopping");
            token.cancel();
        }
    });

    let window = match cli.start_date {
        Some(start) => DateWindow::new(start, config.crawler.lookahead_days),
        None => DateWindow::starting_today(config.crawler.lookahead_days),
    };
    let summary = orchestrator.run(window).await?;

    for day in &summary.days {
        info!(
            "{}: {} links, {} new, {} inserted, {} rejected, {} failed",
            day.date,
            day.links_found,
            day.new_links,
            day.inserted,
            day.rejected,
            day.fetch_failed + day.persist_failed
        );
    }
    Ok(())
}
