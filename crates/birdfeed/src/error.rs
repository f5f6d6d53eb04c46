//! Feed client error types.

use thiserror::Error;

/// Failures raised by the signed-transport collaborator.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed (connect, TLS, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// OAuth signature generation failed
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Token endpoint answered with an unparseable body
    #[error("Invalid token response: {0}")]
    TokenResponse(String),
}

impl TransportError {
    /// HTTP status carried by this failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Feed client errors.
#[derive(Error, Debug)]
pub enum FeedError {
    /// A data operation was attempted without access credentials
    #[error("Not authorized")]
    Unauthorized,

    /// Unrecognized timeline/format flags
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Signed request failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Response body could not be decoded, or decoded to nothing
    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    /// Session store could not be read or written
    #[error("Session store error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeedError {
    /// Check if this error came from the transport collaborator.
    ///
    /// Only these failures are eligible for the stale-cache fallback.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub(crate) fn invalid_response(detail: impl std::fmt::Display) -> Self {
        Self::InvalidResponse(detail.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(TransportError::Http(e))
    }
}

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        let err: FeedError = TransportError::Api {
            status: 503,
            message: "over capacity".into(),
        }
        .into();
        assert!(err.is_transport());
        assert!(!FeedError::Unauthorized.is_transport());
        assert!(!FeedError::invalid_response("empty body").is_transport());
    }

    #[test]
    fn test_api_status() {
        let err = TransportError::Api {
            status: 401,
            message: "bad signature".into(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(TransportError::OAuth("x".into()).status(), None);
    }

    #[test]
    fn test_display() {
        let err = FeedError::InvalidArgument("unknown timeline flags 0x05".into());
        assert_eq!(
            err.to_string(),
            "Invalid argument: unknown timeline flags 0x05"
        );
    }
}
