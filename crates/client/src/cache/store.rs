//! On-disk tier of the offline cache.
//!
//! Layout: `<root>/<version>/<sha256(method + url)>.json`. Each file is one
//! [`DiskRecord`]; the body is stored base64-encoded so binary responses
//! survive the JSON round trip.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, warn};

use super::{CacheEntry, CacheVersion, RequestKey};
use crate::storage::StorageError;

#[derive(Debug, Serialize, Deserialize)]
struct DiskRecord {
    method: String,
    url: String,
    status: u16,
    content_type: Option<String>,
    body: String,
    stored_at: DateTime<Utc>,
}

/// Directory of cached responses, one subdirectory per cache version.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &RequestKey) -> PathBuf {
        let digest = Sha256::digest(format!("{} {}", key.method, key.url).as_bytes());
        self.root
            .join(key.version.as_str())
            .join(format!("{}.json", hex::encode(digest)))
    }

    /// Read the entry for `key`, if any.
    ///
    /// A record whose stored identity differs from `key` is treated as a miss.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the file exists but cannot be read or parsed.
    pub async fn read(&self, key: &RequestKey) -> Result<Option<CacheEntry>, StorageError> {
        let bytes = match fs::read(self.entry_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: DiskRecord = serde_json::from_slice(&bytes)?;
        if record.method != key.method || record.url != key.url {
            warn!(url = %key.url, "Cache file identity mismatch, ignoring");
            return Ok(None);
        }
        let Ok(body) = STANDARD.decode(record.body.as_bytes()) else {
            warn!(url = %key.url, "Cache file body is not valid base64, ignoring");
            return Ok(None);
        };

        Ok(Some(CacheEntry {
            key: key.clone(),
            status: record.status,
            content_type: record.content_type,
            body,
            stored_at: record.stored_at,
        }))
    }

    /// Write `entry`, replacing any previous entry for the same key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the file cannot be written.
    pub async fn write(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        let path = self.entry_path(&entry.key);
        let dir = path
            .parent()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        fs::create_dir_all(&dir).await?;
        let record = DiskRecord {
            method: entry.key.method.clone(),
            url: entry.key.url.clone(),
            status: entry.status,
            content_type: entry.content_type.clone(),
            body: STANDARD.encode(&entry.body),
            stored_at: entry.stored_at,
        };
        let bytes = serde_json::to_vec(&record)?;

        // Each write gets its own temp file, so concurrent writers for one
        // key never share a partial file; the last rename wins.
        let target = path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;
        debug!(url = %entry.key.url, path = %path.display(), "Wrote cache entry to disk");
        Ok(())
    }

    /// Delete every version directory except `keep`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the root cannot be listed or a stale
    /// directory cannot be removed.
    pub async fn purge_except(&self, keep: &CacheVersion) -> Result<usize, StorageError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut purged = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_str() == Some(keep.as_str()) {
                continue;
            }
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await?;
            } else {
                fs::remove_file(&path).await?;
            }
            debug!(path = %path.display(), "Purged stale cache version");
            purged += 1;
        }
        Ok(purged)
    }
}
