//! Domain module - Core entities and repository contracts
//!
//! Event records, the crawl date window, site constants and the
//! storage traits implemented by the infrastructure layer.

pub mod calendar;
pub mod constants;
pub mod event;
pub mod repositories;

// Re-export commonly used items
pub use calendar::DateWindow;
pub use event::{Coordinates, EventRecord, PersistOutcome};
pub use repositories::{CheckpointError, EventRepository, RepositoryError, SeenLinkStore};
