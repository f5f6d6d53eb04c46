//! Feed client configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the feed client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the REST API (default: https://api.twitter.com/1)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL of the search API (default: https://search.twitter.com)
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// OAuth endpoints
    #[serde(default)]
    pub oauth: OAuthEndpoints,

    /// Request timeout
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,

    /// Response cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// URL shortening for long status messages
    #[serde(default)]
    pub shortener: ShortenerConfig,
}

fn default_api_url() -> String {
    "https://api.twitter.com/1".into()
}

fn default_search_url() -> String {
    "https://search.twitter.com".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// OAuth 1.0a endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthEndpoints {
    #[serde(default = "default_request_token_url")]
    pub request_token_url: String,

    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,

    #[serde(default = "default_access_token_url")]
    pub access_token_url: String,

    /// Callback URL; out-of-band (`oob`) when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

fn default_request_token_url() -> String {
    "https://api.twitter.com/oauth/request_token".into()
}

fn default_authorize_url() -> String {
    "https://api.twitter.com/oauth/authorize".into()
}

fn default_access_token_url() -> String {
    "https://api.twitter.com/oauth/access_token".into()
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            request_token_url: default_request_token_url(),
            authorize_url: default_authorize_url(),
            access_token_url: default_access_token_url(),
            callback_url: None,
        }
    }
}

/// Response cache configuration.
///
/// The directory is owned by the caller; it must exist before the first cached read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory; caching is disabled when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Freshness window
    #[serde(default = "default_cache_ttl", with = "duration_secs")]
    pub ttl: Duration,
}

/// Thirty minutes.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(1800);

const fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// URL shortener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Shortening endpoint (default: https://is.gd/api.php)
    #[serde(default = "default_shortener_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_shortener_timeout", with = "duration_secs")]
    pub timeout: Duration,
}

const fn default_true() -> bool {
    true
}

fn default_shortener_endpoint() -> String {
    "https://is.gd/api.php".into()
}

const fn default_shortener_timeout() -> Duration {
    Duration::from_secs(20)
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_shortener_endpoint(),
            timeout: default_shortener_timeout(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            search_url: default_search_url(),
            oauth: OAuthEndpoints::default(),
            timeout: default_timeout(),
            cache: CacheConfig::default(),
            shortener: ShortenerConfig::default(),
        }
    }
}

impl FeedConfig {
    /// Enable the response cache in `dir`.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache.dir = Some(dir.into());
        self
    }

    /// Override the cache freshness window.
    #[must_use]
    pub const fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = ttl;
        self
    }
}
