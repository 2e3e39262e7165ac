use crate::dataset::{self, Dataset, DatasetError, MissingDatasetError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Cached load of the dataset file, refreshed when its modification time changes.
///
/// Callers get a shared, read-only snapshot. Filtering and querying work on
/// that snapshot and never touch the file.
#[derive(Debug)]
pub struct DatasetCache {
    path: PathBuf,
    entry: Option<CacheEntry>,
}

#[derive(Debug)]
struct CacheEntry {
    modified: SystemTime,
    dataset: Arc<Dataset>,
}

impl DatasetCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entry: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current dataset, reloading it if the file changed since the last call.
    pub fn get(&mut self) -> Result<Arc<Dataset>, DatasetError> {
        let modified = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.modified().map_err(|e| DatasetError::Io {
                path: self.path.clone(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.invalidate();
                return Err(MissingDatasetError {
                    path: self.path.clone(),
                }
                .into());
            }
            Err(e) => {
                return Err(DatasetError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        if let Some(entry) = &self.entry {
            if entry.modified == modified {
                return Ok(Arc::clone(&entry.dataset));
            }
            tracing::info!(path = %self.path.display(), "dataset changed on disk, reloading");
        }

        let dataset = Arc::new(dataset::load_dataset(&self.path)?);
        self.entry = Some(CacheEntry {
            modified,
            dataset: Arc::clone(&dataset),
        });
        Ok(dataset)
    }

    /// Drop the cached snapshot so the next `get` reads the file again.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    #[cfg(test)]
    fn is_loaded(&self) -> bool {
        self.entry.is_some()
    }
}
