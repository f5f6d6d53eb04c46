//! Feed API client: builds request URLs and dispatches signed calls.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::{
    cache::{CacheOutcome, ResponseCache},
    codec::Payload,
    config::FeedConfig,
    credentials::{Credentials, TokenPair},
    error::{FeedError, FeedResult, TransportError},
    oauth::{Method, OAuthTransport, percent_encode},
    shorten::{Passthrough, UrlShortener, shorten_links},
    types::{
        OutputFormat, StatusId, TimelineFlags, TimelineRequest, search_format_from_bits,
    },
};

/// Feed API client.
///
/// Mutating calls (post, delete) always go to the network. Timeline reads go through the
/// response cache when one is configured.
pub struct FeedClient<T> {
    transport: T,
    credentials: Credentials,
    api_url: String,
    search_url: String,
    cache: Option<ResponseCache>,
    shortener: Arc<dyn UrlShortener>,
}

impl<T: OAuthTransport> FeedClient<T> {
    /// Create a client. Without access credentials every data call fails with
    /// [`FeedError::Unauthorized`].
    #[must_use]
    pub fn new(transport: T, credentials: Credentials, config: &FeedConfig) -> Self {
        Self {
            transport,
            credentials,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            search_url: config.search_url.trim_end_matches('/').to_string(),
            cache: ResponseCache::from_config(&config.cache),
            shortener: Arc::new(Passthrough),
        }
    }

    /// Use `shortener` for links in over-long status messages.
    #[must_use]
    pub fn with_shortener(mut self, shortener: Arc<dyn UrlShortener>) -> Self {
        self.shortener = shortener;
        self
    }

    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        self.credentials.is_authorized()
    }

    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub const fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    fn access(&self) -> FeedResult<&TokenPair> {
        self.credentials.access().ok_or(FeedError::Unauthorized)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // URL building
    // ─────────────────────────────────────────────────────────────────────────

    /// Full URL of a timeline read; also its cache key.
    #[must_use]
    pub fn timeline_url(&self, request: &TimelineRequest) -> String {
        format!(
            "{}/statuses/{}.{}?count={}&page={}&include_rts={}",
            self.api_url,
            request.kind.endpoint(),
            request.format.extension(),
            request.count,
            request.page,
            request.include_retweets
        )
    }

    /// Full URL of a search.
    pub fn search_url(&self, query: &str, format: OutputFormat) -> FeedResult<String> {
        let format = format.check_search()?;
        Ok(format!(
            "{}/search.{}?q={}",
            self.search_url,
            format.extension(),
            percent_encode(query)
        ))
    }

    fn update_url(&self) -> String {
        format!("{}/statuses/update.xml", self.api_url)
    }

    fn destroy_url(&self, id: &StatusId) -> String {
        format!(
            "{}/statuses/destroy/{}.xml",
            self.api_url,
            percent_encode(id.as_str())
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Post a status update.
    ///
    /// Messages over 140 characters get their links shortened first. Returns the new status
    /// id, or `None` when the response carries none.
    #[instrument(skip(self, message), fields(chars = message.chars().count()))]
    pub async fn post_status(&self, message: &str) -> FeedResult<Option<StatusId>> {
        self.access()?;

        let status = shorten_links(message, self.shortener.as_ref()).await;
        let params = vec![("status".to_string(), status)];
        let payload = self.request(&self.update_url(), Method::Post, &params).await?;

        let id = payload.field("id").map(StatusId::from);
        info!(id = id.as_ref().map(StatusId::as_str), "Posted status");
        Ok(id)
    }

    /// Read a timeline.
    pub async fn read_timeline(&self, request: TimelineRequest) -> FeedResult<Payload> {
        self.fetch_timeline(request)
            .await
            .map(CacheOutcome::into_payload)
    }

    /// Read a timeline selected by legacy flags (see [`TimelineFlags`]).
    pub async fn read_timeline_flags(
        &self,
        flags: u32,
        count: u32,
        page: u32,
        include_retweets: bool,
    ) -> FeedResult<Payload> {
        self.access()?;
        let TimelineFlags { kind, format } = TimelineFlags::from_bits(flags)?;
        self.read_timeline(TimelineRequest {
            kind,
            format,
            count,
            page,
            include_retweets,
        })
        .await
    }

    /// Read a timeline and report how the cache satisfied it.
    ///
    /// Without a cache every read is [`CacheOutcome::Refreshed`].
    #[instrument(skip(self))]
    pub async fn fetch_timeline(&self, request: TimelineRequest) -> FeedResult<CacheOutcome> {
        self.access()?;
        let url = self.timeline_url(&request);
        self.cached_request(&url).await
    }

    /// Delete a status.
    ///
    /// Returns the id the server echoes back, or `None` when no such status exists.
    #[instrument(skip(self))]
    pub async fn delete_status(&self, id: &StatusId) -> FeedResult<Option<StatusId>> {
        self.access()?;

        let params = vec![("id".to_string(), id.to_string())];
        match self.request(&self.destroy_url(id), Method::Post, &params).await {
            Ok(payload) => Ok(payload.field("id").map(StatusId::from)),
            Err(FeedError::Transport(TransportError::Api { status: 404, .. })) => {
                debug!(%id, "Status not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Search statuses. Only JSON and Atom output are served.
    ///
    /// Returns the result list, or `None` when the response has none.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        format: OutputFormat,
    ) -> FeedResult<Option<Vec<Payload>>> {
        self.access()?;
        let url = self.search_url(query, format)?;
        let payload = self.request(&url, Method::Get, &[]).await?;
        Ok(payload.results())
    }

    /// Search with the format given as legacy flag bits.
    pub async fn search_flags(&self, query: &str, flags: u32) -> FeedResult<Option<Vec<Payload>>> {
        self.access()?;
        let format = search_format_from_bits(flags)?;
        self.search(query, format).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    async fn request(
        &self,
        url: &str,
        method: Method,
        params: &[(String, String)],
    ) -> FeedResult<Payload> {
        let access = self.access()?;
        debug!(%method, url, "Dispatching signed request");

        let body = self
            .transport
            .signed_request(access, method, url, params)
            .await?;
        Payload::decode_for_url(url, &body)
    }

    async fn cached_request(&self, url: &str) -> FeedResult<CacheOutcome> {
        match &self.cache {
            None => self
                .request(url, Method::Get, &[])
                .await
                .map(CacheOutcome::Refreshed),
            Some(cache) => cache.fetch(url, || self.request(url, Method::Get, &[])).await,
        }
    }
}
