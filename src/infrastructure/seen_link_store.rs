//! Seen-link checkpoint storage
//!
//! `JsonSeenLinkStore` keeps the set as a sorted JSON array of URLs and
//! replaces the file atomically (write to a sibling temp file, then rename).
//! Saves are serialized so concurrent checkpoints never share the temp file.
//! `MemorySeenLinkStore` is an in-process store for tests and dry runs.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::domain::repositories::{CheckpointError, SeenLinkStore};

pub struct JsonSeenLinkStore {
    path: PathBuf,
    write_lock: AsyncMutex<()>,
}

impl JsonSeenLinkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: AsyncMutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SeenLinkStore for JsonSeenLinkStore {
    async fn load(&self) -> Result<HashSet<String>, CheckpointError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No checkpoint at {:?}, starting with an empty seen-link set", self.path);
                return Ok(HashSet::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if content.trim().is_empty() {
            return Ok(HashSet::new());
        }

        let links: Vec<String> = serde_json::from_str(&content).map_err(|source| CheckpointError::Format {
            path: self.path.display().to_string(),
            source,
        })?;
        info!("Loaded {} seen links from {:?}", links.len(), self.path);
        Ok(links.into_iter().collect())
    }

    async fn save(&self, links: &HashSet<String>) -> Result<(), CheckpointError> {
        let mut sorted: Vec<&String> = links.iter().collect();
        sorted.sort();
        let json = serde_json::to_vec_pretty(&sorted).map_err(|source| CheckpointError::Format {
            path: self.path.display().to_string(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }

        let _writing = self.write_lock.lock().await;
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, json).await.map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!("Checkpointed {} seen links to {:?}", links.len(), self.path);
        Ok(())
    }
}

/// In-memory checkpoint that counts saves
#[derive(Default)]
pub struct MemorySeenLinkStore {
    links: Mutex<HashSet<String>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemorySeenLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_links<I, S>(links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            links: Mutex::new(links.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Links as of the last successful save
    pub fn links(&self) -> HashSet<String> {
        self.links.lock().map(|links| links.clone()).unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every following save fail with an I/O error
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SeenLinkStore for MemorySeenLinkStore {
    async fn load(&self) -> Result<HashSet<String>, CheckpointError> {
        Ok(self.links())
    }

    async fn save(&self, links: &HashSet<String>) -> Result<(), CheckpointError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CheckpointError::Io {
                path: "<memory>".into(),
                source: std::io::Error::other("checkpoint storage unavailable"),
            });
        }
        if let Ok(mut stored) = self.links.lock() {
            stored.clone_from(links);
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
