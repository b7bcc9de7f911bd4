//! Duplicate detection types

use crate::models::ContentSignature;
use crate::services::byte_source::ByteSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// How the UI collaborator wants a detected duplicate handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateChoice {
    /// Discard the pending import and reuse the existing asset
    UseExisting,
    /// Import anyway under a new identity
    ImportCopy,
    /// Discard the pending import entirely
    Cancel,
}

/// Reference to a media item already known to the library
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    pub id: Uuid,
    pub name: String,
}

impl MediaRef {
    /// New media identity for `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// A pending import whose signature matched existing media
#[derive(Clone)]
pub struct DuplicateItem {
    pub id: Uuid,
    pub pending_file_name: String,
    pub source: Arc<dyn ByteSource>,
    pub existing: MediaRef,
    pub signature: ContentSignature,
    /// Set once the decision has been made
    pub choice: Option<DuplicateChoice>,
}

impl DuplicateItem {
    pub fn new(source: Arc<dyn ByteSource>, existing: MediaRef, signature: ContentSignature) -> Self {
        Self {
            id: Uuid::new_v4(),
            pending_file_name: source.name().to_string(),
            source,
            existing,
            signature,
            choice: None,
        }
    }
}

impl fmt::Debug for DuplicateItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplicateItem")
            .field("id", &self.id)
            .field("pending_file_name", &self.pending_file_name)
            .field("existing", &self.existing)
            .field("signature", &self.signature)
            .field("choice", &self.choice)
            .finish()
    }
}
