//! Three-legged OAuth handshake.
//!
//! The handshake spans two invocations. The first obtains a request token, parks it in the
//! [`SessionStore`] and hands back the URL the user must visit. The second, made after the
//! user approved, finds the parked token and trades it for access credentials. The caller
//! persists those and passes them in from then on.

use tracing::{debug, info, instrument};

use crate::{
    client::FeedClient,
    config::FeedConfig,
    credentials::{Credentials, TokenPair},
    error::FeedResult,
    oauth::OAuthTransport,
    session::SessionStore,
};

/// Where the handshake stands for a given set of inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// No access credentials and nothing pending.
    NoCredentials,
    /// A request token awaits the user's approval.
    RequestTokenPending(TokenPair),
    /// Access credentials were supplied.
    AccessGranted,
}

impl HandshakeState {
    /// Classify the inputs. Supplied access credentials win over a pending token.
    pub fn detect(credentials: &Credentials, session: &dyn SessionStore) -> FeedResult<Self> {
        if credentials.is_authorized() {
            return Ok(Self::AccessGranted);
        }
        Ok(match session.get()? {
            Some(pending) if pending.is_complete() => Self::RequestTokenPending(pending),
            _ => Self::NoCredentials,
        })
    }
}

/// Result of one handshake step.
pub enum Authorization<T> {
    /// Access credentials were present; the client is ready for data calls.
    Ready(FeedClient<T>),
    /// The user must visit `authorize_url` and approve the application.
    RedirectRequired { authorize_url: String },
    /// The pending request token was exchanged. Persist these and construct again.
    AccessObtained(TokenPair),
}

impl<T> std::fmt::Debug for Authorization<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Ready"),
            Self::RedirectRequired { authorize_url } => f
                .debug_struct("RedirectRequired")
                .field("authorize_url", authorize_url)
                .finish(),
            Self::AccessObtained(pair) => f.debug_tuple("AccessObtained").field(pair).finish(),
        }
    }
}

/// Run whichever handshake step the inputs call for.
///
/// The pending request token is single use: it is cleared from `session` before the exchange,
/// so a failed exchange restarts the handshake on the next call.
#[instrument(skip_all)]
pub async fn authorize<T: OAuthTransport>(
    transport: T,
    credentials: Credentials,
    config: &FeedConfig,
    session: &dyn SessionStore,
    verifier: Option<&str>,
) -> FeedResult<Authorization<T>> {
    match HandshakeState::detect(&credentials, session)? {
        HandshakeState::AccessGranted => {
            debug!("Access credentials present");
            Ok(Authorization::Ready(FeedClient::new(
                transport,
                credentials,
                config,
            )))
        }
        HandshakeState::NoCredentials => {
            let request = transport.request_token().await?;
            session.set(&request)?;
            let authorize_url = transport.authorize_url(&request.key);
            info!(%authorize_url, "Request token obtained, user approval required");
            Ok(Authorization::RedirectRequired { authorize_url })
        }
        HandshakeState::RequestTokenPending(request) => {
            session.clear()?;
            let access = transport.access_token(&request, verifier).await?;
            info!("Access token obtained");
            Ok(Authorization::AccessObtained(access))
        }
    }
}
