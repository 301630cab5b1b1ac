//! Optional JSON export of persisted events
//!
//! Records are appended to a single JSON array file after each date.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::domain::event::EventRecord;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Export file {path} is not a JSON list of events: {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub struct JsonEventExport {
    path: PathBuf,
}

impl JsonEventExport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records currently in the export file
    pub async fn read_all(&self) -> Result<Vec<EventRecord>, ExportError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ExportError::Io {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|source| ExportError::Format {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub async fn append(&self, records: &[EventRecord]) -> Result<(), ExportError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut all = self.read_all().await?;
        all.extend_from_slice(records);

        let io_error = |source| ExportError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let json = serde_json::to_vec_pretty(&all).map_err(|source| ExportError::Format {
            path: self.path.display().to_string(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await.map_err(io_error)?;
        tokio::fs::rename(&temp_path, &self.path).await.map_err(io_error)?;

        info!("Exported {} events to {:?}", records.len(), self.path);
        Ok(())
    }
}
