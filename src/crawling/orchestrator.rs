//! # Crawl Orchestrator
//!
//! Drives the date window: discover each day's links, skip links already
//! seen, extract and persist the rest, and checkpoint the seen set after
//! every day. A failing link or listing is logged and the run moves on.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::crawling::event_detail_extractor::EventDetailExtractor;
use crate::crawling::link_discoverer::LinkDiscoverer;
use crate::crawling::seen_links::SeenLinks;
use crate::domain::calendar::{DateWindow, format_listing_date};
use crate::domain::event::{EventRecord, PersistOutcome};
use crate::domain::repositories::{CheckpointError, EventRepository, SeenLinkStore};
use crate::infrastructure::config::{CrawlerConfig, RejectedLinkPolicy};
use crate::infrastructure::event_export::JsonEventExport;

/// Errors that end a run
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Failed to load seen-link checkpoint: {0}")]
    CheckpointLoad(#[from] CheckpointError),
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Detail pages processed at the same time
    pub max_concurrent_extractions: usize,

    /// Save the checkpoint every N completed links; 0 saves once per date
    pub checkpoint_interval: usize,

    pub rejected_link_policy: RejectedLinkPolicy,

    /// Only the first N links of each listing are considered
    pub max_links_per_day: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_crawler_config(&CrawlerConfig::default())
    }
}

impl OrchestratorConfig {
    pub fn from_crawler_config(config: &CrawlerConfig) -> Self {
        Self {
            max_concurrent_extractions: config.max_concurrent_extractions.max(1),
            checkpoint_interval: config.checkpoint_interval,
            rejected_link_policy: config.rejected_link_policy,
            max_links_per_day: config.max_links_per_day,
        }
    }
}

/// How one claimed link left the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkOutcome {
    Persisted,
    AlreadyStored,
    /// Record lacked a start time and was not stored
    Rejected,
    FetchFailed,
    PersistFailed,
}

impl LinkOutcome {
    /// Whether the link joins the seen set under `policy`
    pub fn marks_seen(self, policy: RejectedLinkPolicy) -> bool {
        match self {
            Self::Persisted | Self::AlreadyStored => true,
            Self::Rejected => policy == RejectedLinkPolicy::MarkSeen,
            Self::FetchFailed | Self::PersistFailed => false,
        }
    }
}

/// Counts for one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    /// The listing page itself could not be loaded
    pub discovery_failed: bool,
    pub links_found: usize,
    /// Links that were not seen before and were processed
    pub new_links: usize,
    pub inserted: usize,
    pub already_stored: usize,
    pub rejected: usize,
    pub fetch_failed: usize,
    pub persist_failed: usize,
}

impl DaySummary {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            discovery_failed: false,
            links_found: 0,
            new_links: 0,
            inserted: 0,
            already_stored: 0,
            rejected: 0,
            fetch_failed: 0,
            persist_failed: 0,
        }
    }

    fn record(&mut self, outcome: LinkOutcome) {
        self.new_links += 1;
        match outcome {
            LinkOutcome::Persisted => self.inserted += 1,
            LinkOutcome::AlreadyStored => self.already_stored += 1,
            LinkOutcome::Rejected => self.rejected += 1,
            LinkOutcome::FetchFailed => self.fetch_failed += 1,
            LinkOutcome::PersistFailed => self.persist_failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub days: Vec<DaySummary>,
    /// The run was stopped before the end of the window
    pub cancelled: bool,
}

impl CrawlSummary {
    fn total(&self, count: impl Fn(&DaySummary) -> usize) -> usize {
        self.days.iter().map(count).sum()
    }

    pub fn links_found(&self) -> usize {
        self.total(|day| day.links_found)
    }

    pub fn new_links(&self) -> usize {
        self.total(|day| day.new_links)
    }

    pub fn inserted(&self) -> usize {
        self.total(|day| day.inserted)
    }

    pub fn rejected(&self) -> usize {
        self.total(|day| day.rejected)
    }

    /// Fetch and persist failures across all days
    pub fn failed(&self) -> usize {
        self.total(|day| day.fetch_failed + day.persist_failed)
    }
}

pub struct CrawlOrchestrator {
    discoverer: LinkDiscoverer,
    extractor: EventDetailExtractor,
    repository: Arc<dyn EventRepository>,
    seen_store: Arc<dyn SeenLinkStore>,
    export: Option<JsonEventExport>,
    config: OrchestratorConfig,
    cancellation_token: CancellationToken,
    checkpoint_lock: AsyncMutex<()>,
}

impl CrawlOrchestrator {
    pub fn new(
        discoverer: LinkDiscoverer,
        extractor: EventDetailExtractor,
        repository: Arc<dyn EventRepository>,
        seen_store: Arc<dyn SeenLinkStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            discoverer,
            extractor,
            repository,
            seen_store,
            export: None,
            config,
            cancellation_token: CancellationToken::new(),
            checkpoint_lock: AsyncMutex::new(()),
        }
    }

    pub fn with_export(mut self, export: JsonEventExport) -> Self {
        self.export = Some(export);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Cancelling stops the run before the next link or date
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub async fn run(&self, window: DateWindow) -> Result<CrawlSummary, CrawlError> {
        let seen = SeenLinks::new(self.seen_store.load().await?);
        info!(
            "🚀 Crawling {} days from {} ({} links already seen)",
            window.days,
            window.start,
            seen.len()
        );

        let mut summary = CrawlSummary::default();
        for date in window.dates() {
            if self.cancellation_token.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            summary.days.push(self.crawl_day(date, &seen).await);
        }

        if self.cancellation_token.is_cancelled() {
            summary.cancelled = true;
            warn!("🛑 Crawl cancelled after {} days", summary.days.len());
        }
        info!(
            "🏁 Crawl finished: {} links found, {} new, {} inserted, {} rejected, {} failed",
            summary.links_found(),
            summary.new_links(),
            summary.inserted(),
            summary.rejected(),
            summary.failed()
        );
        Ok(summary)
    }

    async fn crawl_day(&self, date: NaiveDate, seen: &SeenLinks) -> DaySummary {
        let mut day = DaySummary::new(date);

        let mut links = match self.discoverer.discover(date).await {
            Ok(links) => links,
            Err(e) => {
                error!("❌ Failed to load listing for {}: {}", date, e);
                day.discovery_failed = true;
                return day;
            }
        };
        day.links_found = links.len();
        info!("📅 Date: {} - Found {} event links", format_listing_date(date), links.len());

        if let Some(limit) = self.config.max_links_per_day {
            links.truncate(limit);
        }

        let listing_date = format_listing_date(date);
        let completed = AtomicUsize::new(0);
        let results: Vec<(LinkOutcome, Option<EventRecord>)> = stream::iter(links)
            .map(|link| {
                let listing_date = listing_date.as_str();
                let completed = &completed;
                async move {
                    if self.cancellation_token.is_cancelled() || !seen.try_claim(&link) {
                        return None;
                    }
                    let (outcome, record) = self.process_link(&link, listing_date).await;
                    seen.complete(&link, outcome.marks_seen(self.config.rejected_link_policy));

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if self.config.checkpoint_interval > 0 && done % self.config.checkpoint_interval == 0 {
                        self.checkpoint(seen).await;
                    }
                    Some((outcome, record))
                }
            })
            .buffer_unordered(self.config.max_concurrent_extractions.max(1))
            .filter_map(|result| async move { result })
            .collect()
            .await;

        let mut persisted = Vec::new();
        for (outcome, record) in results {
            day.record(outcome);
            persisted.extend(record);
        }

        self.checkpoint(seen).await;
        if let Some(export) = &self.export {
            if let Err(e) = export.append(&persisted).await {
                error!("Failed to export events for {}: {}", date, e);
            }
        }

        info!("✅ Done crawling {}: {} events inserted", listing_date, day.inserted);
        day
    }

    /// Extract then persist one claimed link
    async fn process_link(&self, link: &str, listing_date: &str) -> (LinkOutcome, Option<EventRecord>) {
        let record = match self.extractor.extract(link, listing_date).await {
            Ok(extraction) => extraction.into_record(),
            Err(e) => {
                error!("❌ Failed to fetch event {}: {}", link, e);
                return (LinkOutcome::FetchFailed, None);
            }
        };

        match self.repository.persist(&record).await {
            Ok(PersistOutcome::Inserted) => {
                info!(
                    site_event_id = record.site_event_id().unwrap_or_default(),
                    "Inserted event: {}", record
                );
                (LinkOutcome::Persisted, Some(record))
            }
            Ok(PersistOutcome::AlreadyStored) => {
                debug!("Event already stored: {}", link);
                (LinkOutcome::AlreadyStored, None)
            }
            Ok(PersistOutcome::SkippedMissingStartTime) => {
                warn!("⚠️ Skipping event without start time: {}", link);
                (LinkOutcome::Rejected, None)
            }
            Err(e) => {
                error!("❌ Failed to store event {}: {}", link, e);
                (LinkOutcome::PersistFailed, None)
            }
        }
    }

    /// Save the seen set; the snapshot is taken under the lock so an older
    /// set never overwrites a newer one
    async fn checkpoint(&self, seen: &SeenLinks) {
        let _saving = self.checkpoint_lock.lock().await;
        let snapshot = seen.snapshot();
        match self.seen_store.save(&snapshot).await {
            Ok(()) => debug!("Checkpointed {} seen links", snapshot.len()),
            Err(e) => error!("Failed to save seen-link checkpoint: {}", e),
        }
    }
}
