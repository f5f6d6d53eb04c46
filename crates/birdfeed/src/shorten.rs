//! URL shortening for long status messages.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::config::ShortenerConfig;
use crate::error::{FeedError, FeedResult};

/// Maximum status length, in code points, sent without shortening links.
pub const MAX_STATUS_CHARS: usize = 140;

/// An http, https or ftp link: the scheme and a run of non-space characters, minus trailing
/// punctuation. The scheme may follow any character.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?|ftp)://\S*[^\s:);,.!?]").expect("URL pattern is valid")
});

/// Best-effort URL shortener.
///
/// Implementations never fail: when shortening is impossible the input URL comes back.
#[async_trait]
pub trait UrlShortener: Send + Sync {
    async fn shorten(&self, url: &str) -> String;
}

/// Returns every URL unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl UrlShortener for Passthrough {
    async fn shorten(&self, url: &str) -> String {
        url.to_string()
    }
}

/// Shortener backed by the is.gd plain-text API.
#[derive(Debug, Clone)]
pub struct IsGdShortener {
    client: Client,
    endpoint: String,
}

impl IsGdShortener {
    pub fn new(config: &ShortenerConfig) -> FeedResult<Self> {
        Url::parse(&config.endpoint).map_err(|e| {
            FeedError::Config(format!("shortener.endpoint '{}': {e}", config.endpoint))
        })?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FeedError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    async fn request(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .query(&[("longurl", url)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl UrlShortener for IsGdShortener {
    async fn shorten(&self, url: &str) -> String {
        match self.request(url).await {
            Ok(short) if !short.trim().is_empty() => {
                debug!(url, short = short.trim(), "Shortened URL");
                short.trim().to_string()
            }
            Ok(_) => url.to_string(),
            Err(e) => {
                warn!(url, error = %e, "URL shortening failed, keeping original");
                url.to_string()
            }
        }
    }
}

/// Build the shortener `config` selects: is.gd when enabled, otherwise [`Passthrough`].
pub fn shortener_from_config(config: &ShortenerConfig) -> FeedResult<Arc<dyn UrlShortener>> {
    if config.enabled {
        Ok(Arc::new(IsGdShortener::new(config)?))
    } else {
        Ok(Arc::new(Passthrough))
    }
}

/// Shorten every URL in `message` when it exceeds [`MAX_STATUS_CHARS`].
///
/// Text around the URLs is left untouched.
pub async fn shorten_links(message: &str, shortener: &dyn UrlShortener) -> String {
    if message.chars().count() <= MAX_STATUS_CHARS {
        return message.to_string();
    }

    let mut out = String::with_capacity(message.len());
    let mut last = 0;
    for found in URL_PATTERN.find_iter(message) {
        out.push_str(&message[last..found.start()]);
        out.push_str(&shortener.shorten(found.as_str()).await);
        last = found.end();
    }
    out.push_str(&message[last..]);
    out
}
