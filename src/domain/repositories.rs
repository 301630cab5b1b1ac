//! Repository interfaces for event persistence and crawl checkpoints
//!
//! Contains trait definitions for the two durable stores the crawler talks to.

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::event::{EventRecord, PersistOutcome};

/// Storage failure while persisting one event
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Connection setup failed: {0}")]
    Connection(String),
}

/// Failure reading or writing the seen-link checkpoint
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint at {path} is not a JSON list of URLs: {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Store the event and its category associations in one transaction.
    ///
    /// Records without a start time are answered with
    /// `PersistOutcome::SkippedMissingStartTime` and never reach storage.
    async fn persist(&self, record: &EventRecord) -> Result<PersistOutcome, RepositoryError>;
}

/// Durable set of detail URLs that finished orchestration
#[async_trait]
pub trait SeenLinkStore: Send + Sync {
    /// Load the last checkpoint; an absent checkpoint is an empty set.
    async fn load(&self) -> Result<HashSet<String>, CheckpointError>;

    /// Atomically replace the checkpoint with `links`.
    async fn save(&self, links: &HashSet<String>) -> Result<(), CheckpointError>;
}
