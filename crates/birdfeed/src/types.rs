//! Request parameters and identifiers.

use std::fmt;
use std::str::FromStr;

use crate::error::{FeedError, FeedResult};

/// Which timeline to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimelineKind {
    /// The authenticated user's own statuses.
    #[default]
    Me,
    /// The user's statuses and those of everyone they follow.
    MeAndFriends,
    /// Statuses mentioning the user.
    Mentions,
    /// The public timeline.
    Everyone,
}

impl TimelineKind {
    /// Endpoint name under `statuses/`.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Me => "user_timeline",
            Self::MeAndFriends => "friends_timeline",
            Self::Mentions => "mentions",
            Self::Everyone => "public_timeline",
        }
    }

    /// Legacy flag value (low nibble).
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Me => 1,
            Self::MeAndFriends => 2,
            Self::Mentions => 3,
            Self::Everyone => 4,
        }
    }

    const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(Self::Me),
            2 => Some(Self::MeAndFriends),
            3 => Some(Self::Mentions),
            4 => Some(Self::Everyone),
            _ => None,
        }
    }
}

impl FromStr for TimelineKind {
    type Err = FeedError;

    fn from_str(s: &str) -> FeedResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "me" | "self" | "user" => Ok(Self::Me),
            "friends" | "me-and-friends" | "home" => Ok(Self::MeAndFriends),
            "mentions" | "replies" => Ok(Self::Mentions),
            "everyone" | "public" | "all" => Ok(Self::Everyone),
            other => Err(FeedError::InvalidArgument(format!(
                "unknown timeline '{other}'"
            ))),
        }
    }
}

/// Response format, selected by the endpoint's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Xml,
    Json,
    Rss,
    Atom,
}

impl OutputFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Json => "json",
            Self::Rss => "rss",
            Self::Atom => "atom",
        }
    }

    /// Legacy flag value (bits 4-5).
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Xml => 0x00,
            Self::Json => 0x10,
            Self::Rss => 0x20,
            Self::Atom => 0x30,
        }
    }

    const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0x00 => Some(Self::Xml),
            0x10 => Some(Self::Json),
            0x20 => Some(Self::Rss),
            0x30 => Some(Self::Atom),
            _ => None,
        }
    }

    /// Formats the search endpoint serves.
    pub fn check_search(self) -> FeedResult<Self> {
        match self {
            Self::Json | Self::Atom => Ok(self),
            Self::Xml | Self::Rss => Err(FeedError::InvalidArgument(format!(
                "search does not support {} output",
                self.extension()
            ))),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = FeedError;

    fn from_str(s: &str) -> FeedResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(Self::Xml),
            "json" => Ok(Self::Json),
            "rss" => Ok(Self::Rss),
            "atom" => Ok(Self::Atom),
            other => Err(FeedError::InvalidArgument(format!(
                "unknown output format '{other}'"
            ))),
        }
    }
}

const KIND_MASK: u32 = 0x0F;
const FORMAT_MASK: u32 = 0x30;

/// Timeline kind and format packed in the legacy flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineFlags {
    pub kind: TimelineKind,
    pub format: OutputFormat,
}

impl TimelineFlags {
    /// Parse a flag word such as `4 | 0x10` (everyone, json).
    pub fn from_bits(bits: u32) -> FeedResult<Self> {
        let kind = TimelineKind::from_bits(bits & KIND_MASK);
        let format = OutputFormat::from_bits(bits & FORMAT_MASK);
        match (kind, format) {
            (Some(kind), Some(format)) if bits & !(KIND_MASK | FORMAT_MASK) == 0 => {
                Ok(Self { kind, format })
            }
            _ => Err(FeedError::InvalidArgument(format!(
                "unrecognized timeline flags {bits:#04x}"
            ))),
        }
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.kind.bits() | self.format.bits()
    }
}

/// Parse the format bits of a search flag word.
pub fn search_format_from_bits(bits: u32) -> FeedResult<OutputFormat> {
    if bits & !FORMAT_MASK != 0 {
        return Err(FeedError::InvalidArgument(format!(
            "unrecognized search flags {bits:#04x}"
        )));
    }
    OutputFormat::from_bits(bits & FORMAT_MASK)
        .ok_or_else(|| FeedError::InvalidArgument(format!("unrecognized search flags {bits:#04x}")))?
        .check_search()
}

/// Parameters of a timeline read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineRequest {
    pub kind: TimelineKind,
    pub format: OutputFormat,
    pub count: u32,
    pub page: u32,
    pub include_retweets: bool,
}

impl Default for TimelineRequest {
    fn default() -> Self {
        Self {
            kind: TimelineKind::Me,
            format: OutputFormat::Xml,
            count: 20,
            page: 1,
            include_retweets: false,
        }
    }
}

/// Server-assigned status identifier. Opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusId(String);

impl StatusId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for StatusId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for StatusId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_flags_from_bits() {
        let flags = TimelineFlags::from_bits(4 | 0x10).unwrap();
        assert_eq!(flags.kind, TimelineKind::Everyone);
        assert_eq!(flags.format, OutputFormat::Json);
        assert_eq!(flags.bits(), 0x14);

        let flags = TimelineFlags::from_bits(1).unwrap();
        assert_eq!(flags.kind, TimelineKind::Me);
        assert_eq!(flags.format, OutputFormat::Xml);
    }

    #[test]
    fn test_timeline_flags_rejects_unknown_bits() {
        for bits in [0, 5, 0x0F, 0x40 | 1, 0x100 | 2] {
            assert!(
                matches!(
                    TimelineFlags::from_bits(bits),
                    Err(FeedError::InvalidArgument(_))
                ),
                "{bits:#x} accepted"
            );
        }
    }

    #[test]
    fn test_search_format_from_bits() {
        assert_eq!(search_format_from_bits(0x10).unwrap(), OutputFormat::Json);
        assert_eq!(search_format_from_bits(0x30).unwrap(), OutputFormat::Atom);
        assert!(search_format_from_bits(0x00).is_err());
        assert!(search_format_from_bits(0x20).is_err());
        assert!(search_format_from_bits(0x11).is_err());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("public".parse::<TimelineKind>().unwrap(), TimelineKind::Everyone);
        assert_eq!("ATOM".parse::<OutputFormat>().unwrap(), OutputFormat::Atom);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
