//! Partial content signature

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Partial content signature of a source file
///
/// `partial_hash` is SHA-256 over the head window, the tail window and the file size
/// (8 bytes big-endian), hex-encoded. It depends only on content and size, never on the
/// file's name or location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSignature {
    pub partial_hash: String,
    pub file_size: u64,
    pub file_name: String,
    pub generated_at: DateTime<Utc>,
}

impl ContentSignature {
    /// Duplicate equality: same partial hash AND same size
    ///
    /// A heuristic, not proof of identity: bytes between the two sampled windows are
    /// never compared.
    pub fn matches(&self, other: &ContentSignature) -> bool {
        self.file_size == other.file_size && self.partial_hash == other.partial_hash
    }
}
