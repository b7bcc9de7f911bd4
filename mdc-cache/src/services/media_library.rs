//! Media library lookup by content signature
//!
//! The media library itself belongs to the host application; this module only defines
//! what duplicate detection needs from it, plus an in-memory implementation.

use crate::models::{ContentSignature, MediaRef};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Previously recorded signatures of known media
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Media whose signature matches (same partial hash and same size)
    async fn find_by_signature(&self, signature: &ContentSignature) -> Option<MediaRef>;

    /// Remember `media` under `signature`
    async fn record(&self, media: MediaRef, signature: ContentSignature);

    /// True if some recorded media already carries `name`
    async fn name_in_use(&self, name: &str) -> bool;
}

/// In-memory media library
///
/// The first media recorded for a signature stays the match for it; later records of the
/// same content (e.g. imported copies) do not replace it, but their names are still taken.
#[derive(Debug, Default)]
pub struct InMemoryLibrary {
    index: RwLock<LibraryIndex>,
}

#[derive(Debug, Default)]
struct LibraryIndex {
    by_signature: HashMap<(String, u64), (MediaRef, ContentSignature)>,
    names: HashSet<String>,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.by_signature.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.by_signature.is_empty()
    }
}

#[async_trait]
impl MediaLibrary for InMemoryLibrary {
    async fn find_by_signature(&self, signature: &ContentSignature) -> Option<MediaRef> {
        let index = self.index.read().await;
        index
            .by_signature
            .get(&(signature.partial_hash.clone(), signature.file_size))
            .filter(|(_, recorded)| recorded.matches(signature))
            .map(|(media, _)| media.clone())
    }

    async fn record(&self, media: MediaRef, signature: ContentSignature) {
        let mut index = self.index.write().await;
        index.names.insert(media.name.clone());
        index
            .by_signature
            .entry((signature.partial_hash.clone(), signature.file_size))
            .or_insert((media, signature));
    }

    async fn name_in_use(&self, name: &str) -> bool {
        self.index.read().await.names.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn signature(hash: &str, size: u64, name: &str) -> ContentSignature {
        ContentSignature {
            partial_hash: hash.to_string(),
            file_size: size,
            file_name: name.to_string(),
            generated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_find_requires_hash_and_size() {
        let library = InMemoryLibrary::new();
        let media = MediaRef::new("a.mp4");
        library.record(media.clone(), signature("h1", 100, "a.mp4")).await;

        assert_eq!(
            library.find_by_signature(&signature("h1", 100, "b.mp4")).await,
            Some(media)
        );
        assert!(library.find_by_signature(&signature("h1", 101, "a.mp4")).await.is_none());
        assert!(library.find_by_signature(&signature("h2", 100, "a.mp4")).await.is_none());
    }

    #[tokio::test]
    async fn test_first_record_wins() {
        let library = InMemoryLibrary::new();
        let original = MediaRef::new("a.mp4");
        library.record(original.clone(), signature("h1", 100, "a.mp4")).await;
        library.record(MediaRef::new("copy.mp4"), signature("h1", 100, "copy.mp4")).await;

        assert_eq!(library.len().await, 1);
        assert!(library.name_in_use("a.mp4").await);
        assert!(library.name_in_use("copy.mp4").await);
        assert!(!library.name_in_use("b.mp4").await);
        assert_eq!(
            library.find_by_signature(&signature("h1", 100, "x")).await,
            Some(original)
        );
    }
}
