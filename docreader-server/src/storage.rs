//! On-disk storage for uploaded documents.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use docreader_rag::{RagError, Result};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

/// Writes uploads to `{dir}/{filename}`.
///
/// Only the final component of the client-supplied name is used. Two uploads
/// with the same name share a path, and the later one replaces the earlier
/// file on disk; chunks already indexed from the earlier file stay indexed.
/// Uploads of one name are serialized: a [`StoredUpload`] holds the name
/// until it is dropped, so its file cannot be replaced mid-ingest.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

/// A saved upload. The file at `path` is not overwritten while this lives.
#[derive(Debug)]
pub struct StoredUpload {
    pub path: PathBuf,
    _claim: OwnedMutexGuard<()>,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), locks: Arc::default() }
    }

    fn name_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(name.to_owned()).or_default())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store `bytes` under `filename`, creating the directory if needed.
    ///
    /// Waits while another [`StoredUpload`] of the same name is alive.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for names with no usable final
    /// component and [`RagError::Storage`] if the write fails.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredUpload> {
        let name = sanitize_filename(filename)?;
        let claim = self.name_lock(name).lock_owned().await;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "stored upload");
        Ok(StoredUpload { path, _claim: claim })
    }
}

/// Strip any directory part (either separator style) from a client filename.
fn sanitize_filename(filename: &str) -> Result<&str> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(RagError::InvalidInput(format!("unusable upload filename '{filename}'")));
    }
    Ok(name)
}
