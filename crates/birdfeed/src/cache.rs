//! File-backed response cache with stale-on-error fallback.
//!
//! One file per request URL, named by a SHA-256 of the URL. The file holds the encoded payload
//! and its modification time is the last successful refresh. There is no index and no locking:
//! concurrent writers of the same key race and the last one wins.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::codec::Payload;
use crate::config::CacheConfig;
use crate::error::{FeedError, FeedResult};

const FILE_PREFIX: &str = "feed.";

/// What the cache holds for a key.
#[derive(Debug)]
pub enum CacheState {
    Fresh(Payload),
    Stale(Payload),
    None,
}

/// How a cached read was satisfied.
#[derive(Debug)]
pub enum CacheOutcome {
    /// Entry younger than the TTL; no request was made.
    Hit(Payload),
    /// Live request succeeded and the entry was rewritten.
    Refreshed(Payload),
    /// Live request failed; the previous entry was served instead.
    StaleFallback { payload: Payload, error: FeedError },
}

impl CacheOutcome {
    #[must_use]
    pub const fn payload(&self) -> &Payload {
        match self {
            Self::Hit(payload) | Self::Refreshed(payload) | Self::StaleFallback { payload, .. } => {
                payload
            }
        }
    }

    #[must_use]
    pub fn into_payload(self) -> Payload {
        match self {
            Self::Hit(payload) | Self::Refreshed(payload) | Self::StaleFallback { payload, .. } => {
                payload
            }
        }
    }
}

/// Response cache rooted in a caller-owned directory.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResponseCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// `None` when no cache directory is configured.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.dir.as_ref().map(|dir| Self::new(dir, config.ttl))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// File holding the entry for `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(format!("{FILE_PREFIX}{}", hex::encode(digest)))
    }

    /// Read and classify the entry for `key`.
    ///
    /// Unreadable or undecodable entries count as absent.
    pub async fn lookup(&self, key: &str) -> CacheState {
        let path = self.path_for(key);

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %e, "Cache entry unreadable");
                }
                return CacheState::None;
            }
        };

        let payload = match Payload::decode_cached(&text) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring undecodable cache entry");
                return CacheState::None;
            }
        };

        let age = tokio::fs::metadata(&path)
            .await
            .and_then(|meta| meta.modified())
            .map(|modified| {
                SystemTime::now()
                    .duration_since(modified)
                    .unwrap_or(Duration::ZERO)
            });

        match age {
            Ok(age) if age < self.ttl => CacheState::Fresh(payload),
            _ => CacheState::Stale(payload),
        }
    }

    /// Write the encoded payload for `key`, touching its modification time.
    pub async fn store(&self, key: &str, payload: &Payload) -> std::io::Result<()> {
        tokio::fs::write(self.path_for(key), payload.encode()).await
    }

    /// Serve `key` from the cache, refreshing through `refresh` when the entry is not fresh.
    ///
    /// A transport failure during refresh falls back to the previous entry, however old.
    /// Any other failure, or a transport failure with nothing cached, is returned unchanged.
    #[instrument(skip(self, refresh))]
    pub async fn fetch<F, Fut>(&self, key: &str, refresh: F) -> FeedResult<CacheOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FeedResult<Payload>>,
    {
        let candidate = match self.lookup(key).await {
            CacheState::Fresh(payload) => {
                debug!("Serving fresh cache entry");
                return Ok(CacheOutcome::Hit(payload));
            }
            CacheState::Stale(payload) => Some(payload),
            CacheState::None => None,
        };

        match refresh().await {
            Ok(payload) => {
                if let Err(e) = self.store(key, &payload).await {
                    warn!(error = %e, "Failed to write cache entry");
                }
                Ok(CacheOutcome::Refreshed(payload))
            }
            Err(error) if error.is_transport() => match candidate {
                Some(payload) => {
                    warn!(error = %error, "Refresh failed, serving stale cache entry");
                    Ok(CacheOutcome::StaleFallback { payload, error })
                }
                None => Err(error),
            },
            Err(error) => Err(error),
        }
    }
}
