//! Application and user credentials.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An OAuth key/secret pair (consumer, request token or access token).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub key: String,
    pub secret: String,
}

impl TokenPair {
    #[must_use]
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Both halves present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.key.is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Application credentials plus, once authorized, the user's access pair.
#[derive(Debug, Clone)]
pub struct Credentials {
    app: TokenPair,
    access: Option<TokenPair>,
}

impl Credentials {
    /// Credentials for an application that has not been authorized by a user yet.
    #[must_use]
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app: TokenPair::new(app_key, app_secret),
            access: None,
        }
    }

    /// Attach a user access pair. Ignored unless both halves are non-empty.
    #[must_use]
    pub fn with_access(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        let pair = TokenPair::new(key, secret);
        self.access = pair.is_complete().then_some(pair);
        self
    }

    #[must_use]
    pub const fn app(&self) -> &TokenPair {
        &self.app
    }

    #[must_use]
    pub const fn access(&self) -> Option<&TokenPair> {
        self.access.as_ref()
    }

    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        self.access.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_access_is_not_authorized() {
        let creds = Credentials::new("app", "secret").with_access("key", "");
        assert!(!creds.is_authorized());

        let creds = Credentials::new("app", "secret").with_access("key", "value");
        assert!(creds.is_authorized());
        assert_eq!(creds.access().unwrap().key, "key");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let pair = TokenPair::new("visible", "hidden");
        let rendered = format!("{pair:?}");
        assert!(rendered.contains("visible"));
        assert!(!rendered.contains("hidden"));
    }
}
