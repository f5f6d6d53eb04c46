//! Storage for the pending request token between the two handshake steps.

use std::path::PathBuf;

use parking_lot::Mutex;

use crate::credentials::TokenPair;
use crate::error::{FeedError, FeedResult};

/// A single slot holding the pending request token.
///
/// The medium (process memory, a web session, a file) is up to the caller.
pub trait SessionStore: Send + Sync {
    /// The pending request token, if one was stored.
    fn get(&self) -> FeedResult<Option<TokenPair>>;

    /// Store the pending request token.
    fn set(&self, pair: &TokenPair) -> FeedResult<()>;

    /// Drop the pending request token.
    fn clear(&self) -> FeedResult<()>;
}

/// In-process session slot.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<TokenPair>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> FeedResult<Option<TokenPair>> {
        Ok(self.slot.lock().clone())
    }

    fn set(&self, pair: &TokenPair) -> FeedResult<()> {
        *self.slot.lock() = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> FeedResult<()> {
        self.slot.lock().take();
        Ok(())
    }
}

/// Session slot persisted as a small JSON file.
///
/// Lets separate process invocations share the pending token.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> FeedResult<Option<TokenPair>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FeedError::Session(e.to_string())),
        };
        let pair: TokenPair =
            serde_json::from_slice(&raw).map_err(|e| FeedError::Session(e.to_string()))?;
        Ok(pair.is_complete().then_some(pair))
    }

    fn set(&self, pair: &TokenPair) -> FeedResult<()> {
        let raw = serde_json::to_vec(pair).map_err(|e| FeedError::Session(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| FeedError::Session(e.to_string()))
    }

    fn clear(&self) -> FeedResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FeedError::Session(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemorySessionStore::new();
        assert!(store.get().unwrap().is_none());

        store.set(&TokenPair::new("req", "sec")).unwrap();
        assert_eq!(store.get().unwrap(), Some(TokenPair::new("req", "sec")));

        store.clear().unwrap();
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.json"));

        assert!(store.get().unwrap().is_none());
        store.set(&TokenPair::new("req", "sec")).unwrap();
        assert_eq!(store.get().unwrap(), Some(TokenPair::new("req", "sec")));

        store.clear().unwrap();
        assert!(store.get().unwrap().is_none());
        // clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"not json").unwrap();

        let store = FileSessionStore::new(path);
        assert!(matches!(store.get(), Err(FeedError::Session(_))));
    }
}
