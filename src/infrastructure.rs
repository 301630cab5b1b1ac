//! Infrastructure layer for configuration, logging, storage and page fetching
//!
//! Implements the domain's repository traits over sqlx and the JSON
//! checkpoint file, and provides the `PageFetcher` capability used by the
//! crawling layer.

pub mod config;
pub mod database_connection;
pub mod event_export;
pub mod event_repository;
pub mod http_client;
pub mod http_page_fetcher;
pub mod logging;
pub mod page_fetcher;
pub mod parsing;
pub mod parsing_error;
pub mod postgres_event_repository;
pub mod seen_link_store;
pub mod static_page_fetcher;

// Re-export commonly used items
pub use config::{AppConfig, ConfigError, DatabaseBackend, RejectedLinkPolicy};
pub use database_connection::DatabaseConnection;
pub use event_export::{ExportError, JsonEventExport};
pub use event_repository::SqliteEventRepository;
pub use http_client::{HttpClient, HttpClientConfig};
pub use http_page_fetcher::{HttpPageFetcher, RenderMode};
pub use logging::{init_logging, init_logging_with_config};
pub use page_fetcher::{FetchError, HtmlSnapshot, Locator, PageElement, PageFetcher, PageSession, SessionGuard};
pub use parsing::{DetailSelectors, ListingSelectors};
pub use parsing_error::{FieldError, FieldResult};
pub use postgres_event_repository::PostgresEventRepository;
pub use seen_link_store::{JsonSeenLinkStore, MemorySeenLinkStore};
pub use static_page_fetcher::StaticPageFetcher;
