//! Events calendar crawler
//!
//! Crawls a public events calendar day by day, extracts structured event
//! records from the detail pages, deduplicates by URL against a durable
//! seen-link checkpoint and stores the events with their categories in a
//! relational database.

// Module declarations
pub mod crawling;
pub mod domain;
pub mod infrastructure;

// Re-export the pipeline entry points
pub use crawling::{CrawlOrchestrator, CrawlSummary, EventDetailExtractor, LinkDiscoverer, OrchestratorConfig};
pub use domain::{DateWindow, EventRecord, PersistOutcome};
pub use infrastructure::AppConfig;
