//! End-to-end pipeline tests over saved calendar pages
//!
//! Pages are served by `StaticPageFetcher`; events go to an in-memory SQLite
//! database and the checkpoint to a JSON file in a temp directory.

use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use events_crawler::crawling::{CrawlOrchestrator, CrawlSummary, EventDetailExtractor, LinkDiscoverer, OrchestratorConfig};
use events_crawler::domain::{DateWindow, EventRepository, PersistOutcome, SeenLinkStore};
use events_crawler::infrastructure::{
    DatabaseConnection, JsonEventExport, JsonSeenLinkStore, SqliteEventRepository, StaticPageFetcher,
};

const BASE: &str = "https://events.brown.edu";
const LECTURE: &str = "https://events.brown.edu/event/309945-spring-lecture-series";
const EXHIBIT: &str = "https://events.brown.edu/event/309950-commencement-exhibit";
const CONCERT: &str = "https://events.brown.edu/event/309961-orchestra-concert";

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("missing fixture {}: {e}", path.display()))
}

fn day_url(date: &str) -> String {
    format!("{BASE}/day/date/{date}")
}

fn may(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, day).unwrap()
}

/// Two days: the full listing on the 10th, the concert again plus a new event on the 11th
fn calendar() -> StaticPageFetcher {
    let second_day = r#"
        <div class="lw_events_title"><a href="/event/309961-orchestra-concert">Orchestra Concert</a></div>
        <div class="lw_events_title"><a href="/event/310001-science-fair">Science Fair</a></div>
    "#;
    StaticPageFetcher::new()
        .with_page(day_url("20250510"), fixture("day_listing.html"))
        .with_page(day_url("20250511"), second_day)
        .with_page(LECTURE, fixture("event_detail.html"))
        .with_page(EXHIBIT, fixture("event_without_time.html"))
        .with_page(CONCERT, fixture("event_no_description.html"))
        .with_page(
            "https://events.brown.edu/event/310001-science-fair",
            fixture("event_detail.html").replace("Spring Lecture Series", "Science Fair"),
        )
}

struct Harness {
    _db: DatabaseConnection,
    repository: Arc<SqliteEventRepository>,
    _dir: tempfile::TempDir,
    checkpoint: std::path::PathBuf,
}

impl Harness {
    async fn new() -> Self {
        let db = DatabaseConnection::in_memory().await.unwrap();
        let repository = Arc::new(SqliteEventRepository::new(db.pool().clone()));
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = dir.path().join("seen_links.json");
        Self {
            _db: db,
            repository,
            _dir: dir,
            checkpoint,
        }
    }

    fn orchestrator(&self, fetcher: Arc<StaticPageFetcher>) -> CrawlOrchestrator {
        CrawlOrchestrator::new(
            LinkDiscoverer::new(fetcher.clone(), BASE, Duration::ZERO).unwrap(),
            EventDetailExtractor::new(fetcher, Duration::ZERO),
            self.repository.clone(),
            Arc::new(JsonSeenLinkStore::new(&self.checkpoint)),
            OrchestratorConfig::default(),
        )
    }

    async fn run(&self, fetcher: Arc<StaticPageFetcher>, window: DateWindow) -> CrawlSummary {
        self.orchestrator(fetcher).run(window).await.unwrap()
    }
}

#[tokio::test]
async fn second_run_adds_no_rows_and_extracts_nothing() {
    let harness = Harness::new().await;

    let first = harness.run(Arc::new(calendar()), DateWindow::new(may(10), 2)).await;
    assert_eq!(first.inserted(), 3, "lecture, concert and science fair");
    assert_eq!(first.rejected(), 1, "exhibit has no start time");
    assert_eq!(harness.repository.count_events().await.unwrap(), 3);

    let fetcher = Arc::new(calendar());
    let second = harness.run(fetcher.clone(), DateWindow::new(may(10), 2)).await;

    assert_eq!(second.new_links(), 0);
    assert_eq!(second.inserted(), 0);
    assert_eq!(harness.repository.count_events().await.unwrap(), 3);
    for url in [LECTURE, EXHIBIT, CONCERT] {
        assert_eq!(fetcher.navigations(url), 0, "{url} was extracted again");
    }
}

#[tokio::test]
async fn lost_checkpoint_does_not_duplicate_rows() {
    let harness = Harness::new().await;
    harness.run(Arc::new(calendar()), DateWindow::new(may(10), 1)).await;
    std::fs::remove_file(&harness.checkpoint).unwrap();

    let summary = harness.run(Arc::new(calendar()), DateWindow::new(may(10), 1)).await;

    assert_eq!(summary.days[0].already_stored, 2);
    assert_eq!(summary.inserted(), 0);
    assert_eq!(harness.repository.count_events().await.unwrap(), 2);
}

#[tokio::test]
async fn restart_resumes_after_last_checkpointed_day() {
    let harness = Harness::new().await;

    // process stopped after the 10th was checkpointed
    harness.run(Arc::new(calendar()), DateWindow::new(may(10), 1)).await;
    let checkpointed = JsonSeenLinkStore::new(&harness.checkpoint).load().await.unwrap();
    assert_eq!(checkpointed.len(), 3);

    let fetcher = Arc::new(calendar());
    let resumed = harness.run(fetcher.clone(), DateWindow::new(may(10), 2)).await;

    for url in [LECTURE, EXHIBIT, CONCERT] {
        assert_eq!(fetcher.navigations(url), 0, "{url} was extracted again");
    }
    assert_eq!(fetcher.navigations("https://events.brown.edu/event/310001-science-fair"), 1);
    assert_eq!(resumed.inserted(), 1);
}

#[tokio::test]
async fn stored_event_keeps_every_extracted_field() {
    let harness = Harness::new().await;
    harness.run(Arc::new(calendar()), DateWindow::new(may(10), 1)).await;

    let categories = harness.repository.categories_for(LECTURE).await.unwrap();
    assert_eq!(categories, vec!["History".to_string(), "Lecture".to_string()]);

    // "Lecture" is shared by the lecture and the concert; the exhibit was rejected
    let concert_categories = harness.repository.categories_for(CONCERT).await.unwrap();
    assert_eq!(concert_categories, vec!["Lecture".to_string(), "Music".to_string()]);
    assert!(harness.repository.categories_for(EXHIBIT).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_fields_are_contained_to_themselves() {
    let fetcher = Arc::new(calendar());
    let extractor = EventDetailExtractor::new(fetcher, Duration::ZERO);

    let extraction = extractor.extract(CONCERT, "20250510").await.unwrap();
    let record = &extraction.record;

    assert_eq!(record.name.as_deref(), Some("Orchestra Concert"));
    assert_eq!(record.description, None);
    assert_eq!(record.location, None);
    assert_eq!(record.coordinates, None);
    assert_eq!(record.event_type.as_deref(), Some("Performance"));
    assert_eq!(record.group.as_deref(), Some("Department of Music"));
    assert_eq!(
        record.start_time,
        may(10).and_hms_opt(19, 30, 0),
        "lower-case marker with a space still parses"
    );
    assert!(extraction.issue("description").is_some());
    assert!(extraction.issue("coordinates").is_some());
}

#[tokio::test]
async fn full_detail_page_is_extracted() {
    let extractor = EventDetailExtractor::new(Arc::new(calendar()), Duration::ZERO);
    let record = extractor.extract(LECTURE, "20250510").await.unwrap().into_record();

    assert_eq!(record.start_time, may(10).and_hms_opt(10, 0, 0));
    assert_eq!(record.end_time, may(10).and_hms_opt(11, 30, 0));
    assert_eq!(record.timezone.as_deref(), Some("EDT"));
    assert_eq!(
        record.description.as_deref(),
        Some("An evening with visiting scholars on the history of the Providence waterfront.")
    );
    assert_eq!(record.location.as_deref(), Some("Salomon Center for Teaching\nRoom 101"));
    assert_eq!(record.latitude(), Some(41.8268));
    assert_eq!(record.longitude(), Some(-71.4025));
    assert_eq!(record.site_event_id(), Some("309945"));
}

#[tokio::test]
async fn rejected_record_never_reaches_the_events_table() {
    let harness = Harness::new().await;
    let extractor = EventDetailExtractor::new(Arc::new(calendar()), Duration::ZERO);
    let record = extractor.extract(EXHIBIT, "20250510").await.unwrap().into_record();

    assert_eq!(record.start_time, None);
    assert_eq!(record.location.as_deref(), Some("John Hay Library"));
    assert_eq!(
        harness.repository.persist(&record).await.unwrap(),
        PersistOutcome::SkippedMissingStartTime
    );
    assert_eq!(harness.repository.count_events().await.unwrap(), 0);
}

#[tokio::test]
async fn persisted_events_are_exported() {
    let harness = Harness::new().await;
    let export_path = harness.checkpoint.with_file_name("events.json");
    let orchestrator = harness
        .orchestrator(Arc::new(calendar()))
        .with_export(JsonEventExport::new(&export_path));

    orchestrator.run(DateWindow::new(may(10), 1)).await.unwrap();

    let exported = JsonEventExport::new(&export_path).read_all().await.unwrap();
    let mut urls: Vec<_> = exported.iter().map(|record| record.url.as_str()).collect();
    urls.sort_unstable();
    assert_eq!(urls, vec![LECTURE, CONCERT]);
}
