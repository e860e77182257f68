//! Artifact store: an immutable-after-initialization name → bytes mapping.
//!
//! Populated once by [`crate::pki::generate`], then read concurrently by the
//! TLS context factory, the MAPI endpoint fleet, and the HTTP directory
//! publisher. No synchronization is needed after initialization because
//! nothing ever mutates it again.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{Error, Result};

/// Content-type hint for an artifact, used by the HTTP directory publisher.
///
/// Pure-ASCII content (PEM-encoded keys and certs) is advertised as
/// `text/plain`; anything else falls back to a generic binary type. No
/// artifact produced by this crate is ever non-ASCII today, but the rule is
/// byte-level, not name-based.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Fallback content-type for non-ASCII artifact bytes.
pub const BINARY_CONTENT_TYPE: &str = "application/binary";

/// Immutable, insertion-guarded name → bytes store.
#[derive(Debug, Default, Clone)]
pub struct ArtifactStore {
    artifacts: HashMap<String, Arc<[u8]>>,
}

impl ArtifactStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            artifacts: HashMap::new(),
        }
    }

    /// Insert a named artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pki`] if `name` has already been inserted —
    /// a double-insert is a generator defect.
    pub fn insert(&mut self, name: String, bytes: Vec<u8>) -> Result<()> {
        if self.artifacts.contains_key(&name) {
            return Err(Error::Pki(format!("duplicate artifact name: {name}")));
        }
        self.artifacts.insert(name, Arc::from(bytes));
        Ok(())
    }

    /// Look up an artifact by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<[u8]>> {
        self.artifacts.get(name).cloned()
    }

    /// Snapshot of all artifact names, in arbitrary order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    /// Number of artifacts in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Content-type hint for the given artifact bytes: pure ASCII content is
/// advertised as plain text, anything else as binary.
#[must_use]
pub fn content_type_for(bytes: &[u8]) -> &'static str {
    if bytes.is_ascii() {
        TEXT_CONTENT_TYPE
    } else {
        BINARY_CONTENT_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_round_trips() {
        let mut store = ArtifactStore::new();
        store.insert("a.key".to_string(), b"hello".to_vec()).unwrap();
        assert_eq!(&*store.get("a.key").unwrap(), b"hello");
    }

    #[test]
    fn get_missing_returns_none() {
        let store = ArtifactStore::new();
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn duplicate_insert_fails() {
        let mut store = ArtifactStore::new();
        store.insert("a.key".to_string(), vec![1]).unwrap();
        assert!(store.insert("a.key".to_string(), vec![2]).is_err());
    }

    #[test]
    fn names_reflects_all_inserted_artifacts() {
        let mut store = ArtifactStore::new();
        store.insert("a.key".to_string(), vec![1]).unwrap();
        store.insert("b.crt".to_string(), vec![2]).unwrap();
        let mut names: Vec<&str> = store.names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a.key", "b.crt"]);
    }

    #[test]
    fn ascii_bytes_are_text_plain() {
        assert_eq!(content_type_for(b"-----BEGIN CERTIFICATE-----"), TEXT_CONTENT_TYPE);
    }

    #[test]
    fn non_ascii_bytes_are_binary() {
        assert_eq!(content_type_for(&[0xff, 0x00, 0x80]), BINARY_CONTENT_TYPE);
    }
}
