//! Network-first offline cache.
//!
//! Every request the gateway issues goes through [`OfflineCache::fetch`]. The
//! network is always tried first. Only when the transport fails (connect
//! error, timeout, dropped connection) and the request is cacheable under the
//! [`CachePolicy`] is the most recent stored response served instead.
//!
//! # Tiers
//!
//! - Memory: a `moka` cache keyed by [`RequestKey`]
//! - Disk (optional): [`DiskStore`] under `<data_dir>/offline-cache/<version>/`
//!
//! # Versioning
//!
//! Entries are tagged with the active [`CacheVersion`]. Activating a new
//! version purges every entry stored under any other tag, and a write whose
//! fetch began under a superseded version is dropped.

mod policy;
mod store;

pub use policy::CachePolicy;
pub use store::DiskStore;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Request, StatusCode};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::storage::StorageError;

// =============================================================================
// CacheVersion
// =============================================================================

const DEFAULT_VERSION: &str = "nutriscan-v1";

/// Version tag of the offline cache.
///
/// Used as a directory name, so only ASCII alphanumerics, `-`, `_` and `.`
/// are accepted, and it may not start with a dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheVersion(String);

#[derive(Debug, Error)]
#[error("invalid cache version '{0}': use letters, digits, '-', '_' or '.'")]
pub struct InvalidCacheVersion(String);

impl CacheVersion {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CacheVersion {
    fn default() -> Self {
        Self(DEFAULT_VERSION.to_string())
    }
}

impl FromStr for CacheVersion {
    type Err = InvalidCacheVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = !s.is_empty()
            && !s.starts_with('.')
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidCacheVersion(s.to_string()))
        }
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Entries
// =============================================================================

/// Identity of a cached response: method and full URL, under a version tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub version: CacheVersion,
    pub method: String,
    pub url: String,
}

impl RequestKey {
    fn for_request(version: CacheVersion, request: &Request) -> Self {
        Self {
            version,
            method: request.method().as_str().to_string(),
            url: request.url().as_str().to_string(),
        }
    }
}

/// A stored response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: RequestKey,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

/// Where a [`Fetched`] response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Network,
    /// Replayed while the network was unreachable.
    Cache { stored_at: DateTime<Utc> },
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub source: Source,
}

impl Fetched {
    #[must_use]
    pub const fn is_from_cache(&self) -> bool {
        matches!(self.source, Source::Cache { .. })
    }
}

impl From<&CacheEntry> for Fetched {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            status: StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK),
            content_type: entry.content_type.clone(),
            body: entry.body.clone(),
            source: Source::Cache {
                stored_at: entry.stored_at,
            },
        }
    }
}

// =============================================================================
// OfflineCache
// =============================================================================

/// Network-first cache in front of the HTTP client.
#[derive(Clone)]
pub struct OfflineCache {
    inner: Arc<OfflineCacheInner>,
}

struct OfflineCacheInner {
    client: reqwest::Client,
    policy: CachePolicy,
    // Held for reading across each store so activation waits for in-flight
    // writes before purging.
    version: RwLock<CacheVersion>,
    memory: Cache<RequestKey, Arc<CacheEntry>>,
    disk: Option<DiskStore>,
}

impl fmt::Debug for OfflineCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineCache")
            .field("policy", &self.inner.policy)
            .field("disk", &self.inner.disk)
            .finish_non_exhaustive()
    }
}

impl OfflineCache {
    /// Create a cache and activate `version`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if stale versions cannot be purged from disk.
    pub async fn new(
        client: reqwest::Client,
        policy: CachePolicy,
        version: CacheVersion,
        capacity: u64,
        disk: Option<DiskStore>,
    ) -> Result<Self, StorageError> {
        let cache = Self {
            inner: Arc::new(OfflineCacheInner {
                client,
                policy,
                version: RwLock::new(version.clone()),
                memory: Cache::builder().max_capacity(capacity).build(),
                disk,
            }),
        };
        cache.activate(version).await?;
        Ok(cache)
    }

    /// Create a cache from client configuration.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if stale versions cannot be purged from disk.
    pub async fn open(client: reqwest::Client, config: &ClientConfig) -> Result<Self, StorageError> {
        let policy = CachePolicy::new(&config.api_url, &config.cache.allow);
        let disk = config
            .cache
            .persist
            .then(|| DiskStore::new(config.cache_dir()));
        Self::new(
            client,
            policy,
            config.cache.version.clone(),
            config.cache.capacity,
            disk,
        )
        .await
    }

    #[must_use]
    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    /// Currently active version.
    pub async fn version(&self) -> CacheVersion {
        self.inner.version.read().await.clone()
    }

    /// Make `version` the active version and purge every other one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if stale versions cannot be purged from disk.
    #[instrument(skip(self), fields(version = %version))]
    pub async fn activate(&self, version: CacheVersion) -> Result<(), StorageError> {
        let mut active = self.inner.version.write().await;
        *active = version;
        self.inner.memory.invalidate_all();
        if let Some(disk) = &self.inner.disk {
            let purged = disk.purge_except(&active).await?;
            if purged > 0 {
                info!(purged, "Purged stale offline cache versions");
            }
        }
        Ok(())
    }

    /// Send `request`, falling back to the stored response on transport
    /// failure when the request is cacheable.
    ///
    /// Non-success statuses from a reachable server are returned as is; they
    /// are neither stored nor a reason to fall back.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NetworkUnavailable` if the transport failed and
    /// nothing was stored for the request.
    #[instrument(
        skip(self, request),
        fields(method = %request.method(), path = %request.url().path())
    )]
    pub async fn fetch(&self, request: Request) -> Result<Fetched, ClientError> {
        let key = if self.inner.policy.is_cacheable(&request) {
            Some(RequestKey::for_request(self.version().await, &request))
        } else {
            None
        };

        match self.network(request).await {
            Ok(fetched) => {
                if let Some(key) = key
                    && fetched.status.is_success()
                {
                    self.store(key, &fetched).await;
                }
                Ok(fetched)
            }
            Err(e) if e.is_builder() => Err(ClientError::Build(e)),
            Err(e) => {
                if let Some(key) = &key
                    && let Some(entry) = self.lookup(key).await
                {
                    info!(
                        cache_key = %key.url,
                        stored_at = %entry.stored_at,
                        error = %e,
                        "Network unavailable, serving cached response"
                    );
                    return Ok(Fetched::from(entry.as_ref()));
                }
                Err(ClientError::NetworkUnavailable(e))
            }
        }
    }

    /// Most recent stored response for an anonymous `GET` of `url`.
    pub async fn cached(&self, url: &url::Url) -> Option<Fetched> {
        let key = RequestKey {
            version: self.version().await,
            method: reqwest::Method::GET.as_str().to_string(),
            url: url.as_str().to_string(),
        };
        self.lookup(&key).await.map(|entry| Fetched::from(entry.as_ref()))
    }

    async fn network(&self, request: Request) -> Result<Fetched, reqwest::Error> {
        let response = self.inner.client.execute(request).await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().await?.to_vec();

        Ok(Fetched {
            status,
            content_type,
            body,
            source: Source::Network,
        })
    }

    async fn lookup(&self, key: &RequestKey) -> Option<Arc<CacheEntry>> {
        if let Some(entry) = self.inner.memory.get(key).await {
            return Some(entry);
        }
        let disk = self.inner.disk.as_ref()?;
        match disk.read(key).await {
            Ok(Some(entry)) => {
                let entry = Arc::new(entry);
                self.inner.memory.insert(key.clone(), Arc::clone(&entry)).await;
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(cache_key = %key.url, error = %e, "Failed to read cached response");
                None
            }
        }
    }

    async fn store(&self, key: RequestKey, fetched: &Fetched) {
        let active = self.inner.version.read().await;
        if *active != key.version {
            debug!(
                cache_key = %key.url,
                version = %key.version,
                "Dropping response fetched under a superseded cache version"
            );
            return;
        }

        let entry = Arc::new(CacheEntry {
            key,
            status: fetched.status.as_u16(),
            content_type: fetched.content_type.clone(),
            body: fetched.body.clone(),
            stored_at: Utc::now(),
        });
        if let Some(disk) = &self.inner.disk
            && let Err(e) = disk.write(&entry).await
        {
            warn!(cache_key = %entry.key.url, error = %e, "Failed to persist cached response");
        }
        debug!(cache_key = %entry.key.url, "Stored response");
        self.inner.memory.insert(entry.key.clone(), entry).await;
        drop(active);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_version_validation() {
        assert_eq!("nutriscan-v2".parse::<CacheVersion>().unwrap().as_str(), "nutriscan-v2");
        assert_eq!(" v1.2_beta ".parse::<CacheVersion>().unwrap().as_str(), "v1.2_beta");
        assert!("".parse::<CacheVersion>().is_err());
        assert!("../escape".parse::<CacheVersion>().is_err());
        assert!(".hidden".parse::<CacheVersion>().is_err());
        assert!("a/b".parse::<CacheVersion>().is_err());
        assert_eq!(CacheVersion::default().to_string(), "nutriscan-v1");
    }

    #[tokio::test]
    async fn test_activate_purges_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskStore::new(dir.path());
        let stale = CacheEntry {
            key: RequestKey {
                version: "old".parse().unwrap(),
                method: "GET".to_string(),
                url: "http://localhost:8000/api/health".to_string(),
            },
            status: 200,
            content_type: None,
            body: b"{}".to_vec(),
            stored_at: Utc::now(),
        };
        disk.write(&stale).await.unwrap();

        let policy = CachePolicy::new(
            &url::Url::parse("http://localhost:8000/api").unwrap(),
            ["/health"],
        );
        let cache = OfflineCache::new(
            reqwest::Client::new(),
            policy,
            "new".parse().unwrap(),
            16,
            Some(disk.clone()),
        )
        .await
        .unwrap();

        assert_eq!(cache.version().await.as_str(), "new");
        assert!(disk.read(&stale.key).await.unwrap().is_none());
        assert!(!dir.path().join("old").exists());
    }
}
