use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;

use crate::error::FetchError;

/// Read-through cache of disk fetch contents, kept for the whole run.
#[derive(Debug, Default)]
pub struct FileCache {
    entries: Mutex<HashMap<PathBuf, Bytes>>,
}

impl FileCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached bytes for `path`, reading the file on first use.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is missing, unreadable, or not a
    /// regular file.
    pub fn load(&self, path: &Path) -> Result<Bytes, FetchError> {
        if let Some(content) = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return Ok(content.clone());
        }

        // Read outside the lock; two workers racing on the same file both
        // produce identical bytes.
        let metadata = std::fs::metadata(path).map_err(|err| FetchError::ReadFile {
            path: path.to_path_buf(),
            source: err,
        })?;
        if !metadata.is_file() {
            return Err(FetchError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read(path).map_err(|err| FetchError::ReadFile {
            path: path.to_path_buf(),
            source: err,
        })?;
        tracing::debug!("Cached {} ({} bytes)", path.display(), content.len());

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .entry(path.to_path_buf())
            .or_insert_with(|| Bytes::from(content))
            .clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
