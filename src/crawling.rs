//! # Crawling
//!
//! The crawl-dedup-extract-persist pipeline:
//! - `link_discoverer`: detail links listed on one calendar day
//! - `event_detail_extractor`: fault-contained field extraction of one detail page
//! - `seen_links`: atomic claim/complete bookkeeping over the seen-link set
//! - `orchestrator`: the date loop, per-link isolation and checkpointing

pub mod event_detail_extractor;
pub mod link_discoverer;
pub mod orchestrator;
pub mod seen_links;

pub use event_detail_extractor::{EventDetailExtractor, EventExtraction};
pub use link_discoverer::LinkDiscoverer;
pub use orchestrator::{CrawlError, CrawlOrchestrator, CrawlSummary, DaySummary, LinkOutcome, OrchestratorConfig};
pub use seen_links::SeenLinks;
