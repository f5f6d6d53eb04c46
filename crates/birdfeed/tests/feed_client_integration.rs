//! End-to-end tests of the handshake, dispatcher and cache over a scripted transport.
//!
//! The transport records every signed request and answers from a queue, so each test can
//! assert exactly how many network calls an operation made.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use birdfeed::{
    Authorization, CacheOutcome, Credentials, FeedClient, FeedConfig, FeedError, FeedResult,
    MemorySessionStore, Method, OAuthTransport, OutputFormat, Payload, SessionStore, StatusId,
    TimelineKind, TimelineRequest, TokenPair, TransportError, UrlShortener, authorize,
};
use bytes::Bytes;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

// ─── Scripted transport ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct Call {
    method: Method,
    url: String,
    params: Vec<(String, String)>,
}

enum Reply {
    Body(&'static str),
    Status(u16),
}

#[derive(Default)]
struct FakeTransport {
    calls: Mutex<Vec<Call>>,
    replies: Mutex<VecDeque<Reply>>,
    exchanges: Mutex<Vec<(TokenPair, Option<String>)>>,
}

impl FakeTransport {
    fn replying(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl OAuthTransport for FakeTransport {
    async fn request_token(&self) -> FeedResult<TokenPair> {
        Ok(TokenPair::new("req-key", "req-secret"))
    }

    fn authorize_url(&self, request_token: &str) -> String {
        format!("https://api.example.test/oauth/authorize?oauth_token={request_token}")
    }

    async fn access_token(
        &self,
        request_token: &TokenPair,
        verifier: Option<&str>,
    ) -> FeedResult<TokenPair> {
        self.exchanges
            .lock()
            .push((request_token.clone(), verifier.map(str::to_string)));
        Ok(TokenPair::new("acc-key", "acc-secret"))
    }

    async fn signed_request(
        &self,
        _access: &TokenPair,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> FeedResult<Bytes> {
        self.calls.lock().push(Call {
            method,
            url: url.to_string(),
            params: params.to_vec(),
        });
        match self.replies.lock().pop_front() {
            Some(Reply::Body(body)) => Ok(Bytes::from_static(body.as_bytes())),
            Some(Reply::Status(status)) => Err(TransportError::Api {
                status,
                message: "scripted failure".into(),
            }
            .into()),
            None => Err(TransportError::Api {
                status: 503,
                message: "no scripted reply".into(),
            }
            .into()),
        }
    }
}

struct FixedShortener;

#[async_trait]
impl UrlShortener for FixedShortener {
    async fn shorten(&self, _url: &str) -> String {
        "http://is.gd/x".to_string()
    }
}

const TIMELINE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<statuses type="array">
  <status><id>1</id><text>first</text></status>
</statuses>"#;

const TIMELINE_JSON: &str = r#"[{"id":1,"text":"first"},{"id":2,"text":"second"}]"#;

fn config() -> FeedConfig {
    FeedConfig {
        api_url: "https://api.example.test/1".into(),
        search_url: "https://search.example.test".into(),
        ..FeedConfig::default()
    }
}

fn authorized() -> Credentials {
    Credentials::new("app-key", "app-secret").with_access("acc-key", "acc-secret")
}

fn client(transport: &Arc<FakeTransport>, config: &FeedConfig) -> FeedClient<Arc<FakeTransport>> {
    FeedClient::new(Arc::clone(transport), authorized(), config)
}

fn cached_config(ttl: Duration) -> (TempDir, FeedConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = config().with_cache_dir(dir.path()).with_cache_ttl(ttl);
    (dir, config)
}

// ─── Handshake ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn handshake_redirects_then_exchanges_and_clears_session() {
    let transport = FakeTransport::replying([]);
    let session = MemorySessionStore::new();
    let bare = Credentials::new("app-key", "app-secret");

    let first = authorize(Arc::clone(&transport), bare.clone(), &config(), &session, None)
        .await
        .unwrap();
    match first {
        Authorization::RedirectRequired { authorize_url } => {
            assert_eq!(
                authorize_url,
                "https://api.example.test/oauth/authorize?oauth_token=req-key"
            );
        }
        other => panic!("expected redirect, got {other:?}"),
    }
    assert_eq!(
        session.get().unwrap(),
        Some(TokenPair::new("req-key", "req-secret"))
    );

    let second = authorize(
        Arc::clone(&transport),
        bare,
        &config(),
        &session,
        Some("123456"),
    )
    .await
    .unwrap();
    match second {
        Authorization::AccessObtained(access) => {
            assert_eq!(access, TokenPair::new("acc-key", "acc-secret"));
        }
        other => panic!("expected access token, got {other:?}"),
    }
    assert!(session.get().unwrap().is_none());
    assert_eq!(
        transport.exchanges.lock().clone(),
        vec![(
            TokenPair::new("req-key", "req-secret"),
            Some("123456".to_string())
        )]
    );
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn handshake_with_access_credentials_is_ready() {
    let transport = FakeTransport::replying([]);
    let session = MemorySessionStore::new();

    let outcome = authorize(Arc::clone(&transport), authorized(), &config(), &session, None)
        .await
        .unwrap();
    let Authorization::Ready(client) = outcome else {
        panic!("expected a ready client");
    };
    assert!(client.is_authorized());
    assert!(transport.exchanges.lock().is_empty());
}

#[tokio::test]
async fn unauthorized_client_never_touches_the_network() {
    let transport = FakeTransport::replying([Reply::Body(TIMELINE_XML)]);
    let client = FeedClient::new(
        Arc::clone(&transport),
        Credentials::new("app-key", "app-secret"),
        &config(),
    );

    assert!(!client.is_authorized());
    assert!(matches!(
        client.post_status("hello").await,
        Err(FeedError::Unauthorized)
    ));
    assert!(matches!(
        client.read_timeline(TimelineRequest::default()).await,
        Err(FeedError::Unauthorized)
    ));
    assert!(matches!(
        client.delete_status(&StatusId::new("1")).await,
        Err(FeedError::Unauthorized)
    ));
    assert!(matches!(
        client.search("rust", OutputFormat::Json).await,
        Err(FeedError::Unauthorized)
    ));
    assert_eq!(transport.call_count(), 0);
}

// ─── Timelines ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn everyone_xml_timeline_url() {
    let transport = FakeTransport::replying([Reply::Body(TIMELINE_XML)]);
    let client = client(&transport, &config());

    let payload = client.read_timeline_flags(4, 20, 1, false).await.unwrap();

    assert_eq!(
        transport.calls(),
        vec![Call {
            method: Method::Get,
            url: "https://api.example.test/1/statuses/public_timeline.xml?count=20&page=1&include_rts=false"
                .into(),
            params: Vec::new(),
        }]
    );
    let Payload::Xml(root) = payload else {
        panic!("expected XML payload");
    };
    assert_eq!(root.name, "statuses");
    assert_eq!(root.attribute("type"), Some("array"));
}

#[tokio::test]
async fn json_timeline_decodes_as_json() {
    let transport = FakeTransport::replying([Reply::Body(TIMELINE_JSON)]);
    let client = client(&transport, &config());

    let payload = client
        .read_timeline(TimelineRequest {
            kind: TimelineKind::Mentions,
            format: OutputFormat::Json,
            count: 5,
            page: 2,
            include_retweets: true,
        })
        .await
        .unwrap();

    assert_eq!(
        transport.calls()[0].url,
        "https://api.example.test/1/statuses/mentions.json?count=5&page=2&include_rts=true"
    );
    let Payload::Json(value) = payload else {
        panic!("expected JSON payload");
    };
    assert_eq!(value.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn unknown_timeline_flags_are_rejected_without_a_call() {
    let transport = FakeTransport::replying([Reply::Body(TIMELINE_XML)]);
    let client = client(&transport, &config());

    for flags in [0, 7, 0x40 | 1] {
        assert!(matches!(
            client.read_timeline_flags(flags, 20, 1, false).await,
            Err(FeedError::InvalidArgument(_))
        ));
    }
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn empty_response_is_invalid() {
    let transport = FakeTransport::replying([Reply::Body("   ")]);
    let client = client(&transport, &config());

    assert!(matches!(
        client.read_timeline(TimelineRequest::default()).await,
        Err(FeedError::InvalidResponse(_))
    ));
}

// ─── Cache ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_cache_entry_makes_zero_calls() {
    let (_dir, config) = cached_config(Duration::from_secs(3600));
    let transport = FakeTransport::replying([Reply::Body(TIMELINE_XML)]);
    let client = client(&transport, &config);

    let first = client.read_timeline(TimelineRequest::default()).await.unwrap();
    assert_eq!(transport.call_count(), 1);

    let second = client.fetch_timeline(TimelineRequest::default()).await.unwrap();
    assert!(matches!(second, CacheOutcome::Hit(_)));
    assert_eq!(second.into_payload(), first);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn stale_entry_served_when_refresh_fails() {
    let (_dir, config) = cached_config(Duration::ZERO);
    let transport = FakeTransport::replying([Reply::Body(TIMELINE_JSON), Reply::Status(500)]);
    let client = client(&transport, &config);

    let request = TimelineRequest {
        format: OutputFormat::Json,
        ..TimelineRequest::default()
    };
    let first = client.read_timeline(request).await.unwrap();

    let outcome = client.fetch_timeline(request).await.unwrap();
    assert_eq!(transport.call_count(), 2);
    match outcome {
        CacheOutcome::StaleFallback { payload, error } => {
            assert_eq!(payload, first);
            assert!(matches!(
                error,
                FeedError::Transport(TransportError::Api { status: 500, .. })
            ));
        }
        other => panic!("expected stale fallback, got {other:?}"),
    }
}

#[tokio::test]
async fn refresh_failure_without_entry_propagates() {
    let (_dir, config) = cached_config(Duration::from_secs(3600));
    let transport = FakeTransport::replying([Reply::Status(502)]);
    let client = client(&transport, &config);

    let err = client
        .read_timeline(TimelineRequest::default())
        .await
        .unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn undecodable_refresh_is_not_masked_by_stale_entry() {
    let (_dir, config) = cached_config(Duration::ZERO);
    let transport = FakeTransport::replying([Reply::Body(TIMELINE_XML), Reply::Body("<broken>")]);
    let client = client(&transport, &config);

    client.read_timeline(TimelineRequest::default()).await.unwrap();
    let err = client
        .read_timeline(TimelineRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::InvalidResponse(_)));
}

#[tokio::test]
async fn different_pages_are_cached_separately() {
    let (_dir, config) = cached_config(Duration::from_secs(3600));
    let transport =
        FakeTransport::replying([Reply::Body(TIMELINE_XML), Reply::Body(TIMELINE_XML)]);
    let client = client(&transport, &config);

    for page in [1, 2, 1, 2] {
        client
            .read_timeline(TimelineRequest {
                page,
                ..TimelineRequest::default()
            })
            .await
            .unwrap();
    }
    assert_eq!(transport.call_count(), 2);
}

// ─── Post and delete ───────────────────────────────────────────────────────

#[tokio::test]
async fn post_returns_new_status_id() {
    let transport = FakeTransport::replying([Reply::Body(
        "<status><id>42</id><text>hello world</text></status>",
    )]);
    let client = client(&transport, &config());

    let id = client.post_status("hello world").await.unwrap();

    assert_eq!(id, Some(StatusId::new("42")));
    assert_eq!(
        transport.calls(),
        vec![Call {
            method: Method::Post,
            url: "https://api.example.test/1/statuses/update.xml".into(),
            params: vec![("status".into(), "hello world".into())],
        }]
    );
}

#[tokio::test]
async fn post_without_id_in_response_is_none() {
    let transport =
        FakeTransport::replying([Reply::Body("<hash><error>Status is a duplicate.</error></hash>")]);
    let client = client(&transport, &config());

    assert_eq!(client.post_status("again").await.unwrap(), None);
}

#[tokio::test]
async fn post_shortens_links_only_past_140_chars() {
    let prefix = "see http://example.com/a/long/path ";
    let at_limit = format!("{prefix}{}", "x".repeat(140 - prefix.len()));
    let over_limit = format!("{at_limit}y");

    let transport = FakeTransport::replying([
        Reply::Body("<status><id>1</id></status>"),
        Reply::Body("<status><id>2</id></status>"),
    ]);
    let client = client(&transport, &config()).with_shortener(Arc::new(FixedShortener));

    client.post_status(&at_limit).await.unwrap();
    client.post_status(&over_limit).await.unwrap();

    let sent: Vec<String> = transport
        .calls()
        .into_iter()
        .map(|call| call.params[0].1.clone())
        .collect();
    assert_eq!(sent[0], at_limit);
    assert_eq!(
        sent[1],
        over_limit.replace("http://example.com/a/long/path", "http://is.gd/x")
    );
}

#[tokio::test]
async fn delete_returns_echoed_id() {
    let transport = FakeTransport::replying([Reply::Body("<status><id>99</id></status>")]);
    let client = client(&transport, &config());

    let id = client.delete_status(&StatusId::new("99")).await.unwrap();

    assert_eq!(id, Some(StatusId::new("99")));
    assert_eq!(
        transport.calls(),
        vec![Call {
            method: Method::Post,
            url: "https://api.example.test/1/statuses/destroy/99.xml".into(),
            params: vec![("id".into(), "99".into())],
        }]
    );
}

#[tokio::test]
async fn delete_of_missing_status_is_none() {
    let transport = FakeTransport::replying([Reply::Status(404)]);
    let client = client(&transport, &config());

    assert_eq!(client.delete_status(&StatusId::new("7")).await.unwrap(), None);
}

#[tokio::test]
async fn delete_surfaces_other_failures() {
    let transport = FakeTransport::replying([Reply::Status(401)]);
    let client = client(&transport, &config());

    let err = client.delete_status(&StatusId::new("7")).await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::Transport(TransportError::Api { status: 401, .. })
    ));
}

// ─── Search ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_json_returns_results() {
    let transport = FakeTransport::replying([Reply::Body(
        r#"{"results":[{"id":1,"text":"rust lang"},{"id":2,"text":"more rust"}],"query":"rust lang"}"#,
    )]);
    let client = client(&transport, &config());

    let results = client
        .search("rust lang", OutputFormat::Json)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[1].field("text").as_deref(), Some("more rust"));
    assert_eq!(
        transport.calls()[0].url,
        "https://search.example.test/search.json?q=rust%20lang"
    );
    assert_eq!(transport.calls()[0].method, Method::Get);
}

#[tokio::test]
async fn search_atom_returns_entries() {
    let transport = FakeTransport::replying([Reply::Body(
        r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>q</title><entry><id>a</id></entry><entry><id>b</id></entry></feed>"#,
    )]);
    let client = client(&transport, &config());

    let results = client.search_flags("q", 0x30).await.unwrap().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].field("id").as_deref(), Some("a"));
}

#[tokio::test]
async fn search_without_results_is_none() {
    let transport = FakeTransport::replying([Reply::Body(r#"{"query":"nothing"}"#)]);
    let client = client(&transport, &config());

    assert!(client.search("nothing", OutputFormat::Json).await.unwrap().is_none());
}

#[tokio::test]
async fn unsupported_search_format_makes_zero_calls() {
    let transport = FakeTransport::replying([Reply::Body(r#"{"results":[]}"#)]);
    let client = client(&transport, &config());

    assert!(matches!(
        client.search("rust", OutputFormat::Rss).await,
        Err(FeedError::InvalidArgument(_))
    ));
    assert!(matches!(
        client.search_flags("rust", 0x00).await,
        Err(FeedError::InvalidArgument(_))
    ));
    assert!(matches!(
        client.search_flags("rust", 0x50).await,
        Err(FeedError::InvalidArgument(_))
    ));
    assert_eq!(transport.call_count(), 0);
}
