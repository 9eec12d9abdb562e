//! Durable JSON snapshot file with atomic replacement.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::fs;

use super::model::{CacheInfo, Snapshot};

/// Suffix of in-progress snapshot files.
const TEMP_SUFFIX: &str = ".tmp";

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Errors raised by [`SnapshotStore`].
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file exists but does not hold a valid snapshot.
    #[error("snapshot at {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Reading or writing the file failed.
    #[error("snapshot I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The snapshot could not be encoded.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SnapshotError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Reads and writes the snapshot file.
///
/// Each write goes to its own uniquely named temp file next to the target,
/// which is fsynced and then renamed over it, so readers see either the
/// previous document or the new one in full. Concurrent writers never share
/// a temp file; the last rename wins.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current snapshot, `Ok(None)` if none has been written yet.
    pub async fn read(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SnapshotError::io(&self.path, e)),
        };

        let snapshot: Snapshot =
            serde_json::from_slice(&data).map_err(|e| SnapshotError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        snapshot
            .validate()
            .map_err(|reason| SnapshotError::Corrupt {
                path: self.path.clone(),
                reason,
            })?;

        Ok(Some(snapshot))
    }

    /// Freshness summary of the current snapshot.
    pub async fn read_info(&self) -> Result<Option<CacheInfo>, SnapshotError> {
        Ok(self.read().await?.map(|s| s.info()))
    }

    /// Replace the persisted snapshot.
    pub async fn write(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let data = serde_json::to_vec_pretty(snapshot)?;
        let bytes = data.len();
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || Self::replace_file(&path, &data))
            .await
            .map_err(|e| SnapshotError::io(&self.path, io::Error::other(e)))??;

        tracing::debug!(
            path = %self.path.display(),
            total_count = snapshot.total_count(),
            bytes,
            "Snapshot written"
        );

        Ok(())
    }

    /// Write `data` to a uniquely named sibling, fsync it, rename it over
    /// `path` and fsync the directory so the rename itself is durable.
    ///
    /// The temp file is removed when any step before the rename fails.
    fn replace_file(path: &Path, data: &[u8]) -> Result<(), SnapshotError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|e| SnapshotError::io(parent, e))?;

        let prefix = path
            .file_name()
            .map(|name| format!(".{}.", name.to_string_lossy()))
            .unwrap_or_else(|| ".snapshot.".to_string());
        let mut temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(parent)
            .map_err(|e| SnapshotError::io(parent, e))?;

        temp.write_all(data)
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| SnapshotError::io(temp.path(), e))?;

        temp.persist(path)
            .map_err(|e| SnapshotError::io(path, e.error))?;

        sync_dir(parent).map_err(|e| SnapshotError::io(parent, e))
    }

    /// Maximum activity timestamp across the snapshot's records.
    pub fn derive_watermark(snapshot: &Snapshot) -> Option<DateTime<Utc>> {
        snapshot.watermark()
    }
}
