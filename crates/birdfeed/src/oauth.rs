//! OAuth 1.0a signed transport.
//!
//! The feed client never talks HTTP itself. It consumes an [`OAuthTransport`], which owns the
//! consumer credentials, performs the token exchanges of the three-legged flow and signs every
//! API request. [`OAuthClient`] is the reqwest-backed implementation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, header::AUTHORIZATION};
use sha1::Sha1;
use tracing::{debug, instrument};
use url::{Position, Url};

use crate::config::{FeedConfig, OAuthEndpoints};
use crate::credentials::TokenPair;
use crate::error::{FeedError, FeedResult, TransportError};

/// RFC 3986 unreserved characters pass through; everything else is encoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// HTTP method of a signed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signing and token-exchange capability consumed by the feed client.
#[async_trait]
pub trait OAuthTransport: Send + Sync {
    /// Step 1: obtain a request token.
    async fn request_token(&self) -> FeedResult<TokenPair>;

    /// Step 2: URL the user visits to authorize `request_token`.
    fn authorize_url(&self, request_token: &str) -> String;

    /// Step 3: exchange an authorized request token for an access token.
    async fn access_token(
        &self,
        request_token: &TokenPair,
        verifier: Option<&str>,
    ) -> FeedResult<TokenPair>;

    /// Issue a request signed with the user's access token and return the raw body.
    async fn signed_request(
        &self,
        access: &TokenPair,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> FeedResult<Bytes>;
}

#[async_trait]
impl<T: OAuthTransport + ?Sized> OAuthTransport for Arc<T> {
    async fn request_token(&self) -> FeedResult<TokenPair> {
        (**self).request_token().await
    }

    fn authorize_url(&self, request_token: &str) -> String {
        (**self).authorize_url(request_token)
    }

    async fn access_token(
        &self,
        request_token: &TokenPair,
        verifier: Option<&str>,
    ) -> FeedResult<TokenPair> {
        (**self).access_token(request_token, verifier).await
    }

    async fn signed_request(
        &self,
        access: &TokenPair,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> FeedResult<Bytes> {
        (**self).signed_request(access, method, url, params).await
    }
}

/// HMAC-SHA1 OAuth 1.0a client over reqwest.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    consumer: TokenPair,
    endpoints: OAuthEndpoints,
    http_client: Client,
}

impl OAuthClient {
    /// Create a client for the application identified by `consumer`.
    ///
    /// Fails with [`FeedError::Config`] when an endpoint is not an absolute URL.
    pub fn new(consumer: TokenPair, config: &FeedConfig) -> FeedResult<Self> {
        for (name, endpoint) in [
            ("request_token_url", &config.oauth.request_token_url),
            ("authorize_url", &config.oauth.authorize_url),
            ("access_token_url", &config.oauth.access_token_url),
        ] {
            Url::parse(endpoint)
                .map_err(|e| FeedError::Config(format!("oauth.{name} '{endpoint}': {e}")))?;
        }

        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("birdfeed/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeedError::Config(format!("HTTP client: {e}")))?;

        Ok(Self::with_http_client(
            consumer,
            config.oauth.clone(),
            http_client,
        ))
    }

    /// Create with a custom HTTP client.
    #[must_use]
    pub const fn with_http_client(
        consumer: TokenPair,
        endpoints: OAuthEndpoints,
        http_client: Client,
    ) -> Self {
        Self {
            consumer,
            endpoints,
            http_client,
        }
    }

    /// Build the `Authorization` header for a request.
    fn authorization_header(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
        token: Option<&TokenPair>,
    ) -> Result<String, TransportError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TransportError::OAuth(format!("Failed to get timestamp: {e}")))?
            .as_secs()
            .to_string();

        let mut oauth_params = vec![
            ("oauth_consumer_key".to_string(), self.consumer.key.clone()),
            ("oauth_nonce".to_string(), generate_nonce()),
            (
                "oauth_signature_method".to_string(),
                "HMAC-SHA1".to_string(),
            ),
            ("oauth_timestamp".to_string(), timestamp),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some(token) = token {
            oauth_params.push(("oauth_token".to_string(), token.key.clone()));
        }

        let mut all_params = oauth_params.clone();
        all_params.extend(params.iter().cloned());

        let base = signature_base(method, url, &all_params)?;
        let signature = hmac_sha1(
            &self.consumer.secret,
            token.map_or("", |t| t.secret.as_str()),
            &base,
        )?;
        oauth_params.push(("oauth_signature".to_string(), signature));

        // oauth_callback and oauth_verifier go in the header
        oauth_params.extend(
            params
                .iter()
                .filter(|(k, _)| k.starts_with("oauth_"))
                .cloned(),
        );

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {header}"))
    }

    /// POST to a token endpoint and parse the form-encoded answer.
    ///
    /// `params` are oauth_* protocol values and travel in the header only.
    async fn token_exchange(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        token: Option<&TokenPair>,
    ) -> FeedResult<HashMap<String, String>> {
        let header = self.authorization_header(Method::Post, endpoint, params, token)?;

        let response = self
            .http_client
            .post(endpoint)
            .header(AUTHORIZATION, header)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(TransportError::from)?;
        if !status.is_success() {
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: body,
            }
            .into());
        }

        Ok(serde_urlencoded::from_str(&body)
            .map_err(|e| TransportError::TokenResponse(e.to_string()))?)
    }
}

#[async_trait]
impl OAuthTransport for OAuthClient {
    #[instrument(skip(self))]
    async fn request_token(&self) -> FeedResult<TokenPair> {
        let callback = self
            .endpoints
            .callback_url
            .clone()
            .unwrap_or_else(|| "oob".to_string());
        let params = vec![("oauth_callback".to_string(), callback)];

        let fields = self
            .token_exchange(&self.endpoints.request_token_url, &params, None)
            .await?;
        debug!(
            callback_confirmed = fields.get("oauth_callback_confirmed").map(String::as_str),
            "Obtained request token"
        );
        Ok(parse_token_pair(&fields)?)
    }

    fn authorize_url(&self, request_token: &str) -> String {
        format!(
            "{}?oauth_token={}",
            self.endpoints.authorize_url,
            percent_encode(request_token)
        )
    }

    #[instrument(skip_all)]
    async fn access_token(
        &self,
        request_token: &TokenPair,
        verifier: Option<&str>,
    ) -> FeedResult<TokenPair> {
        let params: Vec<(String, String)> = verifier
            .map(|v| ("oauth_verifier".to_string(), v.to_string()))
            .into_iter()
            .collect();

        let fields = self
            .token_exchange(
                &self.endpoints.access_token_url,
                &params,
                Some(request_token),
            )
            .await?;
        debug!(
            screen_name = fields.get("screen_name").map(String::as_str),
            "Obtained access token"
        );
        Ok(parse_token_pair(&fields)?)
    }

    #[instrument(skip(self, access, params))]
    async fn signed_request(
        &self,
        access: &TokenPair,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> FeedResult<Bytes> {
        let header = self.authorization_header(method, url, params, Some(access))?;

        let request = match method {
            Method::Get => self.http_client.get(url).query(params),
            Method::Post => self.http_client.post(url).form(params),
        };

        let response = request
            .header(AUTHORIZATION, header)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        let body = response.bytes().await.map_err(TransportError::from)?;
        debug!(status = status.as_u16(), len = body.len(), "Signed request completed");

        if !status.is_success() {
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            }
            .into());
        }
        Ok(body)
    }
}

/// Build the OAuth signature base string.
///
/// `params` holds the oauth_* values and any form parameters; query pairs are read from `url`.
fn signature_base(
    method: Method,
    url: &str,
    params: &[(String, String)],
) -> Result<String, TransportError> {
    let parsed = Url::parse(url).map_err(|e| TransportError::OAuth(format!("{url}: {e}")))?;
    let base_url = &parsed[..Position::AfterPath];

    let mut encoded: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (percent_encode(&k), percent_encode(&v)))
        .chain(
            params
                .iter()
                .map(|(k, v)| (percent_encode(k), percent_encode(v))),
        )
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!(
        "{}&{}&{}",
        method.as_str(),
        percent_encode(base_url),
        percent_encode(&param_string)
    ))
}

/// Percent-encode a string according to RFC 3986.
pub(crate) fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// Generate a random nonce for OAuth.
fn generate_nonce() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compute HMAC-SHA1 over `data` and return it base64-encoded.
fn hmac_sha1(consumer_secret: &str, token_secret: &str, data: &str) -> Result<String, TransportError> {
    type HmacSha1 = Hmac<Sha1>;

    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| TransportError::OAuth(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

fn parse_token_pair(fields: &HashMap<String, String>) -> Result<TokenPair, TransportError> {
    let token = fields
        .get("oauth_token")
        .ok_or_else(|| TransportError::TokenResponse("Missing oauth_token".into()))?;
    let secret = fields
        .get("oauth_token_secret")
        .ok_or_else(|| TransportError::TokenResponse("Missing oauth_token_secret".into()))?;
    Ok(TokenPair::new(token.clone(), secret.clone()))
}
