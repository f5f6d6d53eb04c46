//! Birdfeed
//!
//! Client library for an OAuth 1.0a protected social feed API.
//!
//! ## Pieces
//!
//! - [`authorize`] walks the three-legged handshake across two invocations, parking the
//!   request token in a caller-supplied [`SessionStore`].
//! - [`FeedClient`] posts, deletes, searches and reads timelines through an
//!   [`OAuthTransport`]; [`OAuthClient`] is the HMAC-SHA1 implementation over reqwest.
//! - [`Payload`] decodes responses as XML or JSON, chosen by the request URL.
//! - [`ResponseCache`] keeps one file per timeline URL and serves the last good copy when the
//!   API is unreachable.
//!
//! ## Example
//!
//! ```no_run
//! use birdfeed::{Authorization, Credentials, FeedConfig, MemorySessionStore, OAuthClient};
//!
//! # async fn run() -> birdfeed::FeedResult<()> {
//! let config = FeedConfig::default().with_cache_dir("/var/cache/birdfeed");
//! let credentials = Credentials::new("app-key", "app-secret").with_access("token", "secret");
//! let transport = OAuthClient::new(credentials.app().clone(), &config)?;
//!
//! let session = MemorySessionStore::new();
//! if let Authorization::Ready(client) =
//!     birdfeed::authorize(transport, credentials, &config, &session, None).await?
//! {
//!     let timeline = client.read_timeline(Default::default()).await?;
//!     println!("{}", timeline.encode());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod cache;
mod client;
mod codec;
mod config;
mod credentials;
mod error;
mod handshake;
mod oauth;
mod session;
mod shorten;
mod types;

pub use cache::{CacheOutcome, CacheState, ResponseCache};
pub use client::FeedClient;
pub use codec::{Format, Payload, XmlElement, XmlNode};
pub use config::{CacheConfig, DEFAULT_CACHE_TTL, FeedConfig, OAuthEndpoints, ShortenerConfig};
pub use credentials::{Credentials, TokenPair};
pub use error::{FeedError, FeedResult, TransportError};
pub use handshake::{Authorization, HandshakeState, authorize};
pub use oauth::{Method, OAuthClient, OAuthTransport};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore};
pub use shorten::{
    IsGdShortener, MAX_STATUS_CHARS, Passthrough, UrlShortener, shorten_links,
    shortener_from_config,
};
pub use types::{
    OutputFormat, StatusId, TimelineFlags, TimelineKind, TimelineRequest,
    search_format_from_bits,
};
