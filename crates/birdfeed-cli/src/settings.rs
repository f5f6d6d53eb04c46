//! Config file loading and credential resolution.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use birdfeed::{Credentials, FeedConfig};
use serde::Deserialize;

/// Contents of the TOML config file.
///
/// Feed settings sit at the top level; credentials live in an optional `[credentials]` table.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub credentials: CredentialSettings,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CredentialSettings {
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub access_key: Option<String>,
    pub access_secret: Option<String>,
}

impl CredentialSettings {
    /// Fill every unset field from `fallback`.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            app_key: self.app_key.or(fallback.app_key),
            app_secret: self.app_secret.or(fallback.app_secret),
            access_key: self.access_key.or(fallback.access_key),
            access_secret: self.access_secret.or(fallback.access_secret),
        }
    }

    /// Build credentials. The application pair is mandatory; the access pair is not.
    pub fn into_credentials(self) -> Result<Credentials> {
        let (Some(app_key), Some(app_secret)) = (self.app_key, self.app_secret) else {
            bail!("application key and secret are required (--app-key/--app-secret or BIRDFEED_APP_KEY/BIRDFEED_APP_SECRET)");
        };
        if app_key.is_empty() || app_secret.is_empty() {
            bail!("application key and secret must not be empty");
        }

        let credentials = Credentials::new(app_key, app_secret);
        Ok(match (self.access_key, self.access_secret) {
            (Some(key), Some(secret)) => credentials.with_access(key, secret),
            _ => credentials,
        })
    }
}

impl Settings {
    /// Load `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Default location of the pending-token file.
#[must_use]
pub fn default_session_path() -> PathBuf {
    PathBuf::from(".birdfeed-session.json")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_full_document() {
        let settings = Settings::parse(
            r#"
            api_url = "https://api.example.test/1"
            timeout = 10

            [cache]
            dir = "/var/cache/birdfeed"
            ttl = 600

            [shortener]
            enabled = false

            [credentials]
            app_key = "ck"
            app_secret = "cs"
            "#,
        )
        .unwrap();

        assert_eq!(settings.feed.api_url, "https://api.example.test/1");
        assert_eq!(settings.feed.search_url, "https://search.twitter.com");
        assert_eq!(settings.feed.timeout, Duration::from_secs(10));
        assert_eq!(
            settings.feed.cache.dir,
            Some(PathBuf::from("/var/cache/birdfeed"))
        );
        assert_eq!(settings.feed.cache.ttl, Duration::from_secs(600));
        assert!(!settings.feed.shortener.enabled);
        assert_eq!(settings.credentials.app_key.as_deref(), Some("ck"));
    }

    #[test]
    fn test_load_missing_path_uses_defaults() {
        let settings = Settings::load(None).unwrap();
        assert!(settings.feed.cache.dir.is_none());
        assert!(settings.credentials.app_key.is_none());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("birdfeed.toml");
        std::fs::write(&path, "[cache]\nttl = 5\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.feed.cache.ttl, Duration::from_secs(5));
        assert!(Settings::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_flags_override_file_credentials() {
        let flags = CredentialSettings {
            app_key: Some("flag-key".into()),
            ..CredentialSettings::default()
        };
        let file = CredentialSettings {
            app_key: Some("file-key".into()),
            app_secret: Some("file-secret".into()),
            access_key: Some("ak".into()),
            access_secret: Some("as".into()),
        };

        let credentials = flags.or(file).into_credentials().unwrap();
        assert_eq!(credentials.app().key, "flag-key");
        assert_eq!(credentials.app().secret, "file-secret");
        assert!(credentials.is_authorized());
    }

    #[test]
    fn test_app_pair_is_required() {
        assert!(CredentialSettings::default().into_credentials().is_err());

        let partial = CredentialSettings {
            app_key: Some("ck".into()),
            app_secret: Some(String::new()),
            ..CredentialSettings::default()
        };
        assert!(partial.into_credentials().is_err());
    }
}
